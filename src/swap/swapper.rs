// ABOUTME: Blue-green alias rotation with health gate and maintenance window.
// ABOUTME: All filesystem work goes through RemoteExecutor shell primitives.

use super::SwapError;
use super::slots::{ObservedAliases, SlotMap};
use super::snapshot::{DeploymentSnapshot, SnapshotStore};
use crate::config::HealthConfig;
use crate::exec::{ExecOutput, RemoteExecutor};
use crate::registry::Environment;
use std::time::Duration;

/// Name of the flag file that marks the maintenance window.
const MAINTENANCE_FLAG: &str = ".maintenance";

/// Rotates the 3-slot alias permutation of a tier with zero data copy.
///
/// Each alias repoint is a symlink created aside and moved into place with
/// `mv -T`, so readers observe either the old or the new target. The three
/// repoints together are not atomic; an interruption leaves a mapping that
/// `SlotMap::from_observed` rejects, which the next invocation surfaces as
/// a partial swap instead of guessing.
pub struct BlueGreenSwapper<'a, E: RemoteExecutor> {
    executor: &'a E,
    snapshots: &'a SnapshotStore,
    health: HealthConfig,
    retention: Duration,
    timeout: Duration,
}

impl<'a, E: RemoteExecutor> BlueGreenSwapper<'a, E> {
    pub fn new(
        executor: &'a E,
        snapshots: &'a SnapshotStore,
        health: HealthConfig,
        retention: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            snapshots,
            health,
            retention,
            timeout,
        }
    }

    async fn sh(
        &self,
        env: &Environment,
        action: &'static str,
        command: &str,
    ) -> Result<ExecOutput, SwapError> {
        let output = self
            .executor
            .run(&env.target, command, self.timeout)
            .await?;
        if !output.success() {
            return Err(SwapError::Command {
                action,
                detail: output.detail().to_string(),
            });
        }
        Ok(output)
    }

    /// Read the raw alias targets from disk.
    pub async fn read_aliases(&self, env: &Environment) -> Result<ObservedAliases, SwapError> {
        let root = env.target.root_str();
        let command = format!(
            r#"for a in current staged previous; do readlink "{root}/$a" 2>/dev/null || echo MISSING; done"#
        );
        let output = self.sh(env, "read alias state", &command).await?;

        let mut lines = output.stdout.lines();
        let mut next = || lines.next().unwrap_or("MISSING").trim().to_string();
        Ok(ObservedAliases {
            current: next(),
            staged: next(),
            previous: next(),
        })
    }

    /// Read and validate the alias mapping, rejecting partial-swap residue.
    pub async fn read_slots(&self, env: &Environment) -> Result<SlotMap, SwapError> {
        let observed = self.read_aliases(env).await?;
        SlotMap::from_observed(&observed).map_err(|observed| SwapError::PartialSwap {
            site: env.site.clone(),
            tier: env.tier,
            observed,
        })
    }

    /// Verify the staged copy is fit to serve before any mutation: the
    /// release marker must exist and the configured health command (if any)
    /// must exit 0.
    pub(crate) async fn health_gate(
        &self,
        env: &Environment,
        alias: &str,
    ) -> Result<(), SwapError> {
        let root = env.target.root_str();
        let marker = &self.health.marker;

        let probe = format!(r#"test -f "{root}/{alias}/{marker}""#);
        let output = self
            .executor
            .run(&env.target, &probe, self.timeout)
            .await?;
        if !output.success() {
            return Err(SwapError::HealthGate {
                site: env.site.clone(),
                tier: env.tier,
                detail: format!("release marker '{marker}' missing in {alias} copy"),
            });
        }

        if let Some(command) = &self.health.command {
            let check = format!(r#"cd "{root}/{alias}" && {command}"#);
            let output = self
                .executor
                .run(&env.target, &check, self.timeout)
                .await?;
            if !output.success() {
                return Err(SwapError::HealthGate {
                    site: env.site.clone(),
                    tier: env.tier,
                    detail: format!(
                        "health command failed (exit {}): {}",
                        output.exit_code,
                        output.detail()
                    ),
                });
            }
        }

        Ok(())
    }

    /// Repoint the three aliases to `to` inside a maintenance window.
    ///
    /// On a mid-rotation failure the maintenance flag is left in place: the
    /// alias state is ambiguous and must not be served until an operator
    /// reconciles it.
    pub(crate) async fn rotate(
        &self,
        env: &Environment,
        to: SlotMap,
    ) -> Result<(), SwapError> {
        let root = env.target.root_str();

        self.sh(
            env,
            "enter maintenance window",
            &format!(r#"touch "{root}/{MAINTENANCE_FLAG}""#),
        )
        .await?;

        for (alias, slot) in to.assignments() {
            let repoint = format!(
                r#"cd "{root}" && rm -f ".{alias}.tmp" && ln -s "{slot}" ".{alias}.tmp" && mv -T ".{alias}.tmp" "{alias}""#,
                slot = slot.dir()
            );
            if let Err(e) = self.sh(env, "repoint alias", &repoint).await {
                tracing::error!(
                    alias,
                    tier = %env.tier,
                    "alias repoint failed mid-rotation; maintenance flag left in place"
                );
                return Err(e);
            }
        }

        // Confirm the rotation landed before opening the window again.
        let landed = self.read_slots(env).await?;
        if landed != to {
            return Err(SwapError::PartialSwap {
                site: env.site.clone(),
                tier: env.tier,
                observed: self.read_aliases(env).await?,
            });
        }

        let clear = format!(r#"rm -f "{root}/{MAINTENANCE_FLAG}""#);
        if let Err(e) = self.sh(env, "clear maintenance window", &clear).await {
            // The rotation itself succeeded; leave this to the diagnostics
            // surface rather than failing the swap.
            tracing::warn!(tier = %env.tier, "failed to clear maintenance flag: {e}");
        }

        Ok(())
    }

    /// Rotate `current -> previous, staged -> current, previous -> staged`
    /// and arm the rollback snapshot.
    pub async fn swap(&self, env: &Environment) -> Result<DeploymentSnapshot, SwapError> {
        let before = self.read_slots(env).await?;
        self.health_gate(env, "staged").await?;

        let after = before.rotated();
        tracing::info!(
            site = %env.site,
            tier = %env.tier,
            %before,
            %after,
            "rotating aliases"
        );
        self.rotate(env, after).await?;

        let snapshot =
            self.snapshots
                .record_swap(&env.site, env.tier, before, after, self.retention)?;
        Ok(snapshot)
    }
}
