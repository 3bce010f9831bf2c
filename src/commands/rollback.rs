// ABOUTME: Rollback command: reverses the last swap on a tier under its lock.
// ABOUTME: Window-closed outcomes surface as exit code 4, not as step failures.

use super::{load, parse_tier};
use crate::error::{Error, Result};
use crate::exec::SshExecutor;
use crate::output::Output;
use crate::registry::{EnvironmentRegistry, FsRegistry};
use crate::swap::{BlueGreenSwapper, RollbackManager, SnapshotStore};
use crate::types::TransitionId;
use chrono::Utc;

pub async fn rollback(site: &str, tier: &str, output: &mut Output) -> Result<()> {
    let (config, site, _cwd) = load(site)?;
    let tier = parse_tier(tier)?;

    let registry = FsRegistry::new(config.state_dir());
    let env = registry.get(&site, tier)?.ok_or_else(|| {
        Error::InvalidConfig(format!("no environment recorded for tier {tier} of {site}"))
    })?;

    let remote = SshExecutor::new(config.trust_first_connection);
    let snapshots = SnapshotStore::new(config.state_dir());
    let swapper = BlueGreenSwapper::new(
        &remote,
        &snapshots,
        config.health.clone(),
        config.policy.rollback_retention,
        config.policy.command_timeout,
    );
    let manager = RollbackManager::new(&swapper, &snapshots);

    // Rollback mutates alias state, so it takes the same tier lock as a
    // transition would.
    let lock_id = TransitionId::new(format!(
        "{site}-rollback-{}",
        Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
    ));
    let lock = registry.acquire_lock(&site, tier, &lock_id, config.policy.stale_lock_after)?;

    output.start_timer();
    output.progress(&format!("Rolling back last swap on tier {tier} of {site}"));

    let result = manager.rollback(&env).await;
    remote.disconnect_all().await;

    if let Err(e) = lock.release() {
        output.warning(&format!("failed to release tier lock: {e}"));
    }

    let snapshot = result?;
    output.success(&format!(
        "Rolled back swap {} (aliases restored to {})",
        snapshot.id, snapshot.before
    ));
    Ok(())
}
