// ABOUTME: Per-(site, tier) mutual exclusion via atomic lock file creation.
// ABOUTME: Stale locks are detectable but only cleared by explicit operator action.

use crate::types::{SiteName, Tier, TransitionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("{info}")]
    Held { info: LockInfo, stale: bool },

    #[error("lock file at {path} is unreadable: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    #[error("lock I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Information about who holds a tier lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    pub site: SiteName,
    pub tier: Tier,
    /// The transition sequence the holder is executing.
    pub transition_id: TransitionId,
    pub acquired_at: DateTime<Utc>,
    /// Age after which this lock should be reported stale, in seconds.
    pub stale_after_secs: u64,
}

impl LockInfo {
    pub fn new(
        site: &SiteName,
        tier: Tier,
        transition_id: &TransitionId,
        stale_after: Duration,
    ) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            site: site.clone(),
            tier,
            transition_id: transition_id.clone(),
            acquired_at: Utc::now(),
            stale_after_secs: stale_after.as_secs(),
        }
    }

    /// Whether the lock has outlived its declared staleness threshold.
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.acquired_at;
        age.num_seconds() >= self.stale_after_secs as i64
    }
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tier {} of {} is locked by {} (pid {}, transition {}) since {}",
            self.tier, self.site, self.holder, self.pid, self.transition_id, self.acquired_at
        )
    }
}

/// A held tier lock. Must be released explicitly; an unreleased lock
/// survives the process so a crash leaves evidence for the operator.
#[derive(Debug)]
pub struct TierLock {
    path: PathBuf,
    released: bool,
}

impl TierLock {
    /// Acquire the lock for (site, tier) by atomically creating the lock
    /// file. Fails with `LockError::Held` (naming the holder) if it exists,
    /// even when the existing lock is stale.
    pub fn acquire(
        locks_dir: &Path,
        site: &SiteName,
        tier: Tier,
        transition_id: &TransitionId,
        stale_after: Duration,
    ) -> Result<Self, LockError> {
        std::fs::create_dir_all(locks_dir)?;
        let path = Self::lock_path(locks_dir, site, tier);

        let info = LockInfo::new(site, tier, transition_id, stale_after);
        let json = serde_json::to_string_pretty(&info).expect("lock info serializes");

        // create_new is the atomic create-if-not-exists; no TOCTOU window.
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                file.write_all(json.as_bytes())?;
                file.sync_all()?;
                tracing::debug!(path = %path.display(), "acquired tier lock");
                Ok(Self {
                    path,
                    released: false,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let existing = Self::read_info(&path)?;
                let stale = existing.is_stale();
                Err(LockError::Held {
                    info: existing,
                    stale,
                })
            }
            Err(e) => Err(LockError::Io(e)),
        }
    }

    /// Read the holder info of an existing lock, if any.
    pub fn peek(locks_dir: &Path, site: &SiteName, tier: Tier) -> Result<Option<LockInfo>, LockError> {
        let path = Self::lock_path(locks_dir, site, tier);
        if !path.exists() {
            return Ok(None);
        }
        Self::read_info(&path).map(Some)
    }

    /// Remove a lock regardless of holder. Explicit operator action only.
    pub fn force_clear(locks_dir: &Path, site: &SiteName, tier: Tier) -> Result<bool, LockError> {
        let path = Self::lock_path(locks_dir, site, tier);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        tracing::warn!(path = %path.display(), "force-cleared tier lock");
        Ok(true)
    }

    fn lock_path(locks_dir: &Path, site: &SiteName, tier: Tier) -> PathBuf {
        locks_dir.join(format!("{}-{}.lock", site, tier))
    }

    fn read_info(path: &Path) -> Result<LockInfo, LockError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| LockError::Corrupted {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Release the lock by removing its file.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Drop for TierLock {
    fn drop(&mut self) {
        if !self.released {
            // Dropped without release: a panic or early return on a fatal
            // error. The file stays on disk so the next invocation reports
            // who held it; log where it is.
            tracing::warn!(
                path = %self.path.display(),
                "tier lock dropped without release; file left for inspection"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteName {
        SiteName::new("test-site").unwrap()
    }

    fn tid(s: &str) -> TransitionId {
        TransitionId::new(s.to_string())
    }

    #[test]
    fn acquire_then_contend_then_release() {
        let dir = tempfile::tempdir().unwrap();

        let lock = TierLock::acquire(
            dir.path(),
            &site(),
            Tier::Prod,
            &tid("t1"),
            Duration::from_secs(3600),
        )
        .unwrap();

        let err = TierLock::acquire(
            dir.path(),
            &site(),
            Tier::Prod,
            &tid("t2"),
            Duration::from_secs(3600),
        )
        .unwrap_err();

        match err {
            LockError::Held { info, stale } => {
                assert_eq!(info.transition_id.as_str(), "t1");
                assert_eq!(info.pid, std::process::id());
                assert!(!stale);
            }
            other => panic!("expected Held, got {other:?}"),
        }

        lock.release().unwrap();

        TierLock::acquire(
            dir.path(),
            &site(),
            Tier::Prod,
            &tid("t3"),
            Duration::from_secs(3600),
        )
        .expect("lock should be free after release")
        .release()
        .unwrap();
    }

    #[test]
    fn different_tiers_do_not_contend() {
        let dir = tempfile::tempdir().unwrap();

        let prod = TierLock::acquire(
            dir.path(),
            &site(),
            Tier::Prod,
            &tid("t1"),
            Duration::from_secs(3600),
        )
        .unwrap();
        let stg = TierLock::acquire(
            dir.path(),
            &site(),
            Tier::Stg,
            &tid("t2"),
            Duration::from_secs(3600),
        )
        .unwrap();

        prod.release().unwrap();
        stg.release().unwrap();
    }

    #[test]
    fn stale_lock_is_reported_but_not_broken() {
        let dir = tempfile::tempdir().unwrap();

        // Zero threshold: stale immediately.
        let _held = TierLock::acquire(
            dir.path(),
            &site(),
            Tier::Prod,
            &tid("t1"),
            Duration::from_secs(0),
        )
        .unwrap();

        let err = TierLock::acquire(
            dir.path(),
            &site(),
            Tier::Prod,
            &tid("t2"),
            Duration::from_secs(0),
        )
        .unwrap_err();

        match err {
            LockError::Held { stale, .. } => assert!(stale, "zero-threshold lock must be stale"),
            other => panic!("expected Held, got {other:?}"),
        }

        // Still held: staleness never auto-breaks.
        assert!(
            TierLock::peek(dir.path(), &site(), Tier::Prod)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn force_clear_removes_lock() {
        let dir = tempfile::tempdir().unwrap();

        let _held = TierLock::acquire(
            dir.path(),
            &site(),
            Tier::Prod,
            &tid("t1"),
            Duration::from_secs(3600),
        )
        .unwrap();

        assert!(TierLock::force_clear(dir.path(), &site(), Tier::Prod).unwrap());
        assert!(TierLock::peek(dir.path(), &site(), Tier::Prod).unwrap().is_none());
        assert!(!TierLock::force_clear(dir.path(), &site(), Tier::Prod).unwrap());
    }
}
