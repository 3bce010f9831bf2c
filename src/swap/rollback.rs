// ABOUTME: Rollback of the most recent swap, bounded by the retention window.
// ABOUTME: Applies the exact inverse rotation behind the same health gate.

use super::slots::SlotMap;
use super::snapshot::{DeploymentSnapshot, SnapshotStore, WindowClosed};
use super::swapper::BlueGreenSwapper;
use super::{RollbackError, SwapError};
use crate::exec::RemoteExecutor;
use crate::registry::Environment;

/// Reverses the last recorded swap of a tier.
pub struct RollbackManager<'a, E: RemoteExecutor> {
    swapper: &'a BlueGreenSwapper<'a, E>,
    snapshots: &'a SnapshotStore,
}

impl<'a, E: RemoteExecutor> RollbackManager<'a, E> {
    pub fn new(swapper: &'a BlueGreenSwapper<'a, E>, snapshots: &'a SnapshotStore) -> Self {
        Self { swapper, snapshots }
    }

    /// Apply the inverse rotation of the last armed swap snapshot.
    ///
    /// Leaves the alias mapping untouched whenever the window is closed:
    /// no history, already rolled back, superseded by a later swap, past
    /// retention, or on-disk drift from the recorded state.
    pub async fn rollback(
        &self,
        env: &Environment,
    ) -> Result<DeploymentSnapshot, RollbackError> {
        let target = self
            .snapshots
            .rollback_target(&env.site, env.tier)
            .map_err(SwapError::from)?;

        let snapshot = match target {
            Ok(snapshot) => snapshot,
            Err(reason) => {
                return Err(RollbackError::WindowExpired {
                    site: env.site.clone(),
                    tier: env.tier,
                    reason,
                });
            }
        };

        // A partial swap surfaces here as its own fatal error; a valid but
        // different mapping means someone swapped outside this history.
        let on_disk = self.swapper.read_slots(env).await?;
        if on_disk != snapshot.after {
            return Err(RollbackError::WindowExpired {
                site: env.site.clone(),
                tier: env.tier,
                reason: WindowClosed::Drifted {
                    expected: snapshot.after,
                    found: on_disk,
                },
            });
        }

        // The slot about to become current again must still be servable.
        self.swapper.health_gate(env, "previous").await?;

        let restored: SlotMap = snapshot.after.rotated_back();
        debug_assert_eq!(restored, snapshot.before);

        tracing::info!(
            site = %env.site,
            tier = %env.tier,
            from = %snapshot.after,
            to = %restored,
            "rolling back last swap"
        );
        self.swapper.rotate(env, restored).await?;

        self.snapshots
            .mark_consumed(&env.site, env.tier, &snapshot.id)
            .map_err(SwapError::from)?;

        Ok(snapshot)
    }
}
