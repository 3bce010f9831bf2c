// ABOUTME: Status command: registered environments, lock holders, swap history.
// ABOUTME: Read-only view over the same state files the engine writes.

use super::load;
use crate::error::Result;
use crate::output::Output;
use crate::registry::{EnvironmentRegistry, FsRegistry};
use crate::swap::{SnapshotStatus, SnapshotStore};
use crate::types::Tier;

pub async fn status(site: &str, output: &mut Output) -> Result<()> {
    let (config, site, _cwd) = load(site)?;
    let registry = FsRegistry::new(config.state_dir());
    let snapshots = SnapshotStore::new(config.state_dir());

    let envs = registry.list(&site)?;
    if envs.is_empty() {
        output.progress(&format!("No environments recorded for {site}"));
        return Ok(());
    }

    output.progress(&format!("Site: {site}"));
    for env in &envs {
        output.progress(&format!(
            "  {}: {:?} at {} ({})",
            env.tier, env.status, env.target, env.domain
        ));
    }

    for tier in Tier::ALL {
        if let Some(info) = registry.lock_holder(&site, tier)? {
            let stale = if info.is_stale() {
                " [stale; clear with 'terrace unlock']"
            } else {
                ""
            };
            output.progress(&format!("  lock: {info}{stale}"));
        }
    }

    for tier in Tier::ALL {
        if let Some(last) = snapshots.history(&site, tier)?.last() {
            let note = match last.status {
                SnapshotStatus::Armed => "rollback available",
                SnapshotStatus::Consumed => "rolled back",
                SnapshotStatus::Superseded => "rollback window closed",
            };
            output.progress(&format!(
                "  last swap on {tier}: {} at {} ({note})",
                last.id, last.created_at
            ));
        }
    }

    Ok(())
}
