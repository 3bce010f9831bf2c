// ABOUTME: Durable step progress journal: append-only JSON lines per (site, transition).
// ABOUTME: Computes the resume point after a crash; never infers partial in-step success.

use crate::types::{SiteName, TransitionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal {path} line {line} is unreadable: {reason}")]
    Corrupted {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One journal line about one step of one sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub transition_id: TransitionId,
    pub step_index: usize,
    pub status: StepStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "lowercase")]
enum JournalEntry {
    /// Opens a new sequence. Everything after it (until the next Begin)
    /// belongs to this transition_id.
    Begin {
        transition_id: TransitionId,
        total_steps: usize,
        at: DateTime<Utc>,
    },
    Step(StepRecord),
}

/// A sequence resolved from the journal, ready to begin or resume.
#[derive(Debug, Clone)]
pub struct PendingSequence {
    pub id: TransitionId,
    pub resume_point: usize,
    pub is_new: bool,
    pub total_steps: usize,
}

/// Append-only progress log under `<state>/journal/<site>/<transition>.log`.
///
/// Single-writer by contract: the caller holds the tier lock before any
/// write. Reads are safe anytime.
#[derive(Debug, Clone)]
pub struct StepTracker {
    state_dir: PathBuf,
}

impl StepTracker {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    fn journal_path(&self, site: &SiteName, transition: &str) -> PathBuf {
        self.state_dir
            .join("journal")
            .join(site.as_str())
            .join(format!("{transition}.log"))
    }

    fn read_entries(&self, path: &Path) -> Result<Vec<JournalEntry>, TrackerError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path)?;
        let mut entries = Vec::new();
        for (i, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(line).map_err(|e| TrackerError::Corrupted {
                path: path.to_path_buf(),
                line: i + 1,
                reason: e.to_string(),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn append(&self, path: &Path, entry: &JournalEntry) -> Result<(), TrackerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry).expect("journal entry serializes");
        line.push('\n');

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        file.write_all(line.as_bytes())?;
        // The resume guarantee depends on this line surviving a crash.
        file.sync_all()?;
        Ok(())
    }

    /// Latest sequence in the journal, if any, with per-step last statuses.
    fn latest_sequence(
        &self,
        path: &Path,
    ) -> Result<Option<(TransitionId, usize, HashMap<usize, StepStatus>)>, TrackerError> {
        let entries = self.read_entries(path)?;

        let mut current: Option<(TransitionId, usize, HashMap<usize, StepStatus>)> = None;
        for entry in entries {
            match entry {
                JournalEntry::Begin {
                    transition_id,
                    total_steps,
                    ..
                } => {
                    current = Some((transition_id, total_steps, HashMap::new()));
                }
                JournalEntry::Step(record) => {
                    if let Some((id, _, statuses)) = current.as_mut()
                        && *id == record.transition_id
                    {
                        statuses.insert(record.step_index, record.status);
                    }
                }
            }
        }
        Ok(current)
    }

    fn first_incomplete(total: usize, statuses: &HashMap<usize, StepStatus>) -> Option<usize> {
        (0..total).find(|i| statuses.get(i) != Some(&StepStatus::Completed))
    }

    /// Resolve the sequence a new invocation should run: the open sequence
    /// from the journal (crash or failure left it incomplete), or a fresh
    /// one. Read-only; `begin` makes a fresh sequence durable.
    pub fn prepare(
        &self,
        site: &SiteName,
        transition: &str,
        total_steps: usize,
    ) -> Result<PendingSequence, TrackerError> {
        let path = self.journal_path(site, transition);

        if let Some((id, total, statuses)) = self.latest_sequence(&path)?
            && let Some(resume_point) = Self::first_incomplete(total, &statuses)
        {
            tracing::debug!(
                %id,
                resume_point,
                "resuming incomplete sequence"
            );
            return Ok(PendingSequence {
                id,
                resume_point,
                is_new: false,
                total_steps: total,
            });
        }

        let id = TransitionId::new(format!(
            "{site}-{transition}-{}",
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        ));
        Ok(PendingSequence {
            id,
            resume_point: 0,
            is_new: true,
            total_steps,
        })
    }

    /// Make a fresh sequence durable. No-op for resumed sequences.
    pub fn begin(
        &self,
        site: &SiteName,
        transition: &str,
        sequence: &PendingSequence,
    ) -> Result<(), TrackerError> {
        if !sequence.is_new {
            return Ok(());
        }
        let path = self.journal_path(site, transition);
        self.append(
            &path,
            &JournalEntry::Begin {
                transition_id: sequence.id.clone(),
                total_steps: sequence.total_steps,
                at: Utc::now(),
            },
        )
    }

    /// First step of the sequence that has not completed; equals the step
    /// count once the sequence is done.
    pub fn resume_point(
        &self,
        site: &SiteName,
        transition: &str,
        id: &TransitionId,
    ) -> Result<usize, TrackerError> {
        let path = self.journal_path(site, transition);
        match self.latest_sequence(&path)? {
            Some((latest_id, total, statuses)) if latest_id == *id => {
                Ok(Self::first_incomplete(total, &statuses).unwrap_or(total))
            }
            _ => Ok(0),
        }
    }

    /// Durably record a step status change.
    pub fn mark(
        &self,
        site: &SiteName,
        transition: &str,
        id: &TransitionId,
        step_index: usize,
        status: StepStatus,
    ) -> Result<(), TrackerError> {
        let path = self.journal_path(site, transition);
        self.append(
            &path,
            &JournalEntry::Step(StepRecord {
                transition_id: id.clone(),
                step_index,
                status,
                at: Utc::now(),
            }),
        )
    }
}
