// ABOUTME: Unlock command: explicit operator force-clear of a tier lock.
// ABOUTME: The only path that removes a lock not owned by the caller.

use super::{load, parse_tier};
use crate::error::Result;
use crate::output::Output;
use crate::registry::{EnvironmentRegistry, FsRegistry};

pub async fn unlock(site: &str, tier: &str, output: &mut Output) -> Result<()> {
    let (config, site, _cwd) = load(site)?;
    let tier = parse_tier(tier)?;
    let registry = FsRegistry::new(config.state_dir());

    if let Some(info) = registry.lock_holder(&site, tier)? {
        output.progress(&format!("Clearing: {info}"));
    }

    if registry.force_unlock(&site, tier)? {
        output.success(&format!("Lock cleared for tier {tier} of {site}"));
    } else {
        output.success(&format!("No lock held for tier {tier} of {site}"));
    }
    Ok(())
}
