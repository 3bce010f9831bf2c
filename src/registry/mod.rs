// ABOUTME: Environment registry: which tiers exist, their bindings, and tier locks.
// ABOUTME: Trait seam over a flat-file store so the core is format-agnostic.

mod environment;
mod lock;

pub use environment::{EnvStatus, Environment};
pub use lock::{LockError, LockInfo, TierLock};

use crate::types::{SiteName, Tier, TransitionId};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("environment record at {path} is unreadable: {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

/// Tracks which tiers exist for a site and guards them with per-tier locks.
///
/// Backed by any persistent store; the engine depends only on this trait.
pub trait EnvironmentRegistry: Send + Sync {
    /// The stored record for (site, tier), or None if nothing was recorded.
    fn get(&self, site: &SiteName, tier: Tier) -> Result<Option<Environment>, RegistryError>;

    /// Persist (create or replace) an environment record.
    fn put(&self, env: &Environment) -> Result<(), RegistryError>;

    /// All recorded environments of a site, ordered by tier.
    fn list(&self, site: &SiteName) -> Result<Vec<Environment>, RegistryError>;

    /// Acquire the mutation lock for (site, tier).
    fn acquire_lock(
        &self,
        site: &SiteName,
        tier: Tier,
        transition_id: &TransitionId,
        stale_after: Duration,
    ) -> Result<TierLock, LockError>;

    /// Current lock holder, if any.
    fn lock_holder(&self, site: &SiteName, tier: Tier) -> Result<Option<LockInfo>, LockError>;

    /// Remove a lock regardless of holder. Explicit operator action only.
    fn force_unlock(&self, site: &SiteName, tier: Tier) -> Result<bool, LockError>;
}

/// Registry over human-inspectable JSON files in the state directory:
/// `envs/<site>/<tier>.json` and `locks/<site>-<tier>.lock`.
#[derive(Debug, Clone)]
pub struct FsRegistry {
    state_dir: PathBuf,
}

impl FsRegistry {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn env_path(&self, site: &SiteName, tier: Tier) -> PathBuf {
        self.state_dir
            .join("envs")
            .join(site.as_str())
            .join(format!("{tier}.json"))
    }

    fn locks_dir(&self) -> PathBuf {
        self.state_dir.join("locks")
    }
}

impl EnvironmentRegistry for FsRegistry {
    fn get(&self, site: &SiteName, tier: Tier) -> Result<Option<Environment>, RegistryError> {
        let path = self.env_path(site, tier);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let env = serde_json::from_str(&content).map_err(|e| RegistryError::Corrupted {
            path,
            reason: e.to_string(),
        })?;
        Ok(Some(env))
    }

    fn put(&self, env: &Environment) -> Result<(), RegistryError> {
        let path = self.env_path(&env.site, env.tier);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(env).expect("environment serializes");

        // Write-then-rename keeps the record readable at every instant.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn list(&self, site: &SiteName) -> Result<Vec<Environment>, RegistryError> {
        let mut envs = Vec::new();
        for tier in Tier::ALL {
            if let Some(env) = self.get(site, tier)? {
                envs.push(env);
            }
        }
        Ok(envs)
    }

    fn acquire_lock(
        &self,
        site: &SiteName,
        tier: Tier,
        transition_id: &TransitionId,
        stale_after: Duration,
    ) -> Result<TierLock, LockError> {
        TierLock::acquire(&self.locks_dir(), site, tier, transition_id, stale_after)
    }

    fn lock_holder(&self, site: &SiteName, tier: Tier) -> Result<Option<LockInfo>, LockError> {
        TierLock::peek(&self.locks_dir(), site, tier)
    }

    fn force_unlock(&self, site: &SiteName, tier: Tier) -> Result<bool, LockError> {
        TierLock::force_clear(&self.locks_dir(), site, tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Target;

    fn site() -> SiteName {
        SiteName::new("reg-site").unwrap()
    }

    #[test]
    fn get_returns_none_for_unrecorded_tier() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsRegistry::new(dir.path());

        assert!(registry.get(&site(), Tier::Stg).unwrap().is_none());
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsRegistry::new(dir.path());

        let env = Environment::absent(
            site(),
            Tier::Stg,
            Target::local("/tmp/stg"),
            "stg.test".to_string(),
        )
        .with_status(EnvStatus::Active);
        registry.put(&env).unwrap();

        let loaded = registry.get(&site(), Tier::Stg).unwrap().unwrap();
        assert_eq!(loaded.status, EnvStatus::Active);
        assert_eq!(loaded.domain, "stg.test");
    }

    #[test]
    fn list_orders_by_tier() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsRegistry::new(dir.path());

        for tier in [Tier::Prod, Tier::Dev] {
            let env = Environment::absent(
                site(),
                tier,
                Target::local(format!("/tmp/{tier}")),
                format!("{tier}.test"),
            )
            .with_status(EnvStatus::Active);
            registry.put(&env).unwrap();
        }

        let tiers: Vec<Tier> = registry
            .list(&site())
            .unwrap()
            .into_iter()
            .map(|e| e.tier)
            .collect();
        assert_eq!(tiers, vec![Tier::Dev, Tier::Prod]);
    }
}
