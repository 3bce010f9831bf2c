// ABOUTME: Application-wide error types for terrace.
// ABOUTME: Maps the failure taxonomy onto the documented exit codes.

use crate::types::Tier;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown site: {0}")]
    UnknownSite(String),

    #[error("site {site} has no binding for tier {tier}")]
    UnboundTier { site: String, tier: Tier },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Transition(#[from] crate::transition::TransitionError),

    #[error(transparent)]
    Rollback(#[from] crate::swap::RollbackError),

    #[error(transparent)]
    Lock(#[from] crate::registry::LockError),

    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error(transparent)]
    Snapshot(#[from] crate::swap::StoreError),

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("command exited {0}")]
    CommandFailed(i32),

    #[error(transparent)]
    Exec(#[from] crate::exec::ExecError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code surfaced to callers and cron wrappers.
    ///
    /// 0 success, 1 step failed (resumable), 2 validation failure,
    /// 3 lock held, 4 rollback window expired, 5 partial swap.
    pub fn exit_code(&self) -> i32 {
        use crate::swap::{RollbackError, SwapError};
        use crate::transition::TransitionError;

        match self {
            Error::Transition(e) => match e {
                TransitionError::Unknown(_)
                | TransitionError::Precondition { .. }
                | TransitionError::ConfirmationRequired { .. }
                | TransitionError::Config(_) => 2,
                TransitionError::Lock(_) => 3,
                TransitionError::Swap(SwapError::PartialSwap { .. }) => 5,
                _ => 1,
            },
            Error::Rollback(e) => match e {
                RollbackError::WindowExpired { .. } => 4,
                RollbackError::Swap(SwapError::PartialSwap { .. }) => 5,
                _ => 1,
            },
            Error::Lock(_) => 3,
            Error::Hook(_) => 1,
            Error::AlreadyExists(_)
            | Error::ConfigNotFound(_)
            | Error::UnknownSite(_)
            | Error::UnboundTier { .. }
            | Error::InvalidConfig(_)
            | Error::Yaml(_) => 2,
            Error::Registry(_)
            | Error::Snapshot(_)
            | Error::Io(_)
            | Error::CommandFailed(_)
            | Error::Exec(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
