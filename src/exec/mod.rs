// ABOUTME: Remote command execution boundary.
// ABOUTME: One trait over local and SSH targets; everything I/O flows through it.

mod local;
mod ssh_exec;

pub use local::LocalExecutor;
pub use ssh_exec::SshExecutor;

use crate::types::Target;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn command: {0}")]
    Spawn(std::io::Error),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("SSH error on {host}: {source}")]
    Ssh {
        host: String,
        source: crate::ssh::Error,
    },

    #[error("executor cannot reach target {0}")]
    UnsupportedTarget(String),
}

/// Output of a command run against a target.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stderr if non-empty, otherwise stdout. Used in error reports.
    pub fn detail(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Runs a shell command against a named target with a timeout.
///
/// Implementations must not retry: the transition engine owns retry and
/// resume semantics. A non-zero exit code is a successful `run` that
/// reports failure through `ExecOutput`.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn run(
        &self,
        target: &Target,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ExecError>;
}
