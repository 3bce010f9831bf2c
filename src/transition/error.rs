// ABOUTME: Error types for transition execution.
// ABOUTME: Failures carry (site, tier, step, output) and the exact resume command.

use super::tracker::TrackerError;
use crate::exec::ExecError;
use crate::provision::ProvisionError;
use crate::registry::{LockError, RegistryError};
use crate::swap::SwapError;
use crate::types::{SiteName, Tier};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("unknown transition '{0}'")]
    Unknown(String),

    #[error("{0}")]
    Config(String),

    #[error("transition '{name}' ends in a production swap; re-run with --yes to confirm")]
    ConfirmationRequired { name: String },

    /// Bad input or state: fix and re-run from scratch, nothing was marked.
    #[error("precondition failed at step {index} ({step}) of {transition}: {detail}")]
    Precondition {
        transition: String,
        index: usize,
        step: String,
        detail: String,
    },

    /// The step's command did not succeed. Resumable: the journal holds the
    /// failure and the resume command re-executes this exact step.
    #[error(
        "step {index} ({step}) of {transition} failed on tier {tier} of {site} (exit {exit_code}): {detail}; resume with '{resume}'"
    )]
    StepFailed {
        transition: String,
        index: usize,
        step: String,
        site: SiteName,
        tier: Tier,
        exit_code: i32,
        detail: String,
        resume: String,
    },

    /// The step's command succeeded but its verification gate did not:
    /// "ran but failed health check", as opposed to "did not run".
    #[error(
        "step {index} ({step}) of {transition} ran but failed verification on tier {tier} of {site}: {detail}; resume with '{resume}'"
    )]
    VerificationFailed {
        transition: String,
        index: usize,
        step: String,
        site: SiteName,
        tier: Tier,
        detail: String,
        resume: String,
    },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Swap(#[from] SwapError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Exec(#[from] ExecError),
}
