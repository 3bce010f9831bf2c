// ABOUTME: Local command execution via sh -c with a timeout.
// ABOUTME: Handles Target::Local; remote targets are rejected here.

use super::{ExecError, ExecOutput, RemoteExecutor};
use crate::types::Target;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Executes commands on the control machine.
#[derive(Debug, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }

    pub(crate) async fn run_local(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ExecError> {
        tracing::debug!(command, "running local command");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ExecError::Spawn)?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        // Drain pipes concurrently with wait() so a chatty command cannot
        // deadlock on a full pipe buffer.
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = tokio::select! {
            status = child.wait() => status.map_err(ExecError::Spawn)?,
            _ = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                return Err(ExecError::Timeout(timeout));
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ExecOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
        })
    }
}

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    async fn run(
        &self,
        target: &Target,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ExecError> {
        match target {
            Target::Local { .. } => self.run_local(command, timeout).await,
            Target::Remote { .. } => Err(ExecError::UnsupportedTarget(target.to_string())),
        }
    }
}
