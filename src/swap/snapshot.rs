// ABOUTME: Deployment snapshot store: one armed rollback point per tier.
// ABOUTME: History is kept as human-inspectable JSON in the state directory.

use super::slots::SlotMap;
use crate::types::{SiteName, SnapshotId, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot record at {path} is unreadable: {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotStatus {
    /// Open rollback point: the swap it records can still be reversed.
    Armed,
    /// Rollback was performed against this snapshot.
    Consumed,
    /// A later swap recycled the directory this snapshot would restore.
    Superseded,
}

/// The alias mapping around one swap, kept for rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSnapshot {
    pub id: SnapshotId,
    pub site: SiteName,
    pub tier: Tier,
    pub before: SlotMap,
    pub after: SlotMap,
    pub created_at: DateTime<Utc>,
    pub retained_until: DateTime<Utc>,
    pub status: SnapshotStatus,
}

/// Why no snapshot is currently eligible for rollback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowClosed {
    NoHistory,
    Consumed,
    Superseded,
    Expired { at: DateTime<Utc> },
    /// The on-disk aliases no longer match the recorded post-swap state.
    Drifted { expected: SlotMap, found: SlotMap },
}

impl std::fmt::Display for WindowClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowClosed::NoHistory => write!(f, "no swap has been recorded for this tier"),
            WindowClosed::Consumed => write!(f, "the last swap was already rolled back"),
            WindowClosed::Superseded => {
                write!(f, "a later swap superseded the rollback point")
            }
            WindowClosed::Expired { at } => {
                write!(f, "the rollback window expired at {at}")
            }
            WindowClosed::Drifted { expected, found } => {
                write!(
                    f,
                    "the alias mapping changed since the recorded swap (expected {expected}; found {found})"
                )
            }
        }
    }
}

/// Persists swap history per (site, tier) at
/// `<state>/snapshots/<site>-<tier>.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    state_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    fn path(&self, site: &SiteName, tier: Tier) -> PathBuf {
        self.state_dir
            .join("snapshots")
            .join(format!("{site}-{tier}.json"))
    }

    pub fn history(
        &self,
        site: &SiteName,
        tier: Tier,
    ) -> Result<Vec<DeploymentSnapshot>, StoreError> {
        let path = self.path(site, tier);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| StoreError::Corrupted {
            path,
            reason: e.to_string(),
        })
    }

    fn save(
        &self,
        site: &SiteName,
        tier: Tier,
        history: &[DeploymentSnapshot],
    ) -> Result<(), StoreError> {
        let path = self.path(site, tier);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(history).expect("snapshots serialize");
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Record a completed swap.
    ///
    /// The new snapshot is armed only when no open rollback point exists; a
    /// swap performed over an open point marks that point Superseded and its
    /// own window never opens, since the rotation recycled the directory the
    /// open point would have restored.
    pub fn record_swap(
        &self,
        site: &SiteName,
        tier: Tier,
        before: SlotMap,
        after: SlotMap,
        retention: Duration,
    ) -> Result<DeploymentSnapshot, StoreError> {
        let mut history = self.history(site, tier)?;
        let now = Utc::now();

        let had_open_point = history
            .iter_mut()
            .filter(|s| s.status == SnapshotStatus::Armed && s.retained_until > now)
            .map(|s| s.status = SnapshotStatus::Superseded)
            .count()
            > 0;

        let snapshot = DeploymentSnapshot {
            id: SnapshotId::new(format!("{site}-{tier}-{}", now.format("%Y%m%dT%H%M%S%.3f"))),
            site: site.clone(),
            tier,
            before,
            after,
            created_at: now,
            retained_until: now
                + chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::hours(24)),
            status: if had_open_point {
                SnapshotStatus::Superseded
            } else {
                SnapshotStatus::Armed
            },
        };

        history.push(snapshot.clone());
        self.save(site, tier, &history)?;
        Ok(snapshot)
    }

    /// The snapshot an invoked rollback would reverse, or why none is
    /// eligible. The target is always the most recent swap.
    pub fn rollback_target(
        &self,
        site: &SiteName,
        tier: Tier,
    ) -> Result<Result<DeploymentSnapshot, WindowClosed>, StoreError> {
        let history = self.history(site, tier)?;
        let Some(last) = history.last() else {
            return Ok(Err(WindowClosed::NoHistory));
        };

        let verdict = match last.status {
            SnapshotStatus::Consumed => Err(WindowClosed::Consumed),
            SnapshotStatus::Superseded => Err(WindowClosed::Superseded),
            SnapshotStatus::Armed => {
                if Utc::now() > last.retained_until {
                    Err(WindowClosed::Expired {
                        at: last.retained_until,
                    })
                } else {
                    Ok(last.clone())
                }
            }
        };
        Ok(verdict)
    }

    /// Mark a snapshot consumed after a successful rollback.
    pub fn mark_consumed(
        &self,
        site: &SiteName,
        tier: Tier,
        id: &SnapshotId,
    ) -> Result<(), StoreError> {
        let mut history = self.history(site, tier)?;
        for snapshot in history.iter_mut() {
            if &snapshot.id == id {
                snapshot.status = SnapshotStatus::Consumed;
            }
        }
        self.save(site, tier, &history)
    }
}
