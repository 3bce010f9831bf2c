// ABOUTME: SSH-backed RemoteExecutor with per-host session caching.
// ABOUTME: Local targets fall through to LocalExecutor so one executor serves both.

use super::{ExecError, ExecOutput, LocalExecutor, RemoteExecutor};
use crate::ssh::{Session, SessionConfig};
use crate::types::Target;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Executes commands on remote hosts over SSH, reusing one session per host.
///
/// Sessions are established lazily on first use. Local targets are delegated
/// to a `LocalExecutor` so the transition engine only needs one executor.
pub struct SshExecutor {
    local: LocalExecutor,
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    trust_on_first_use: bool,
}

impl SshExecutor {
    pub fn new(trust_on_first_use: bool) -> Self {
        Self {
            local: LocalExecutor::new(),
            sessions: Mutex::new(HashMap::new()),
            trust_on_first_use,
        }
    }

    async fn session_for(
        &self,
        host: &str,
        port: u16,
        user: Option<&str>,
    ) -> Result<Arc<Session>, ExecError> {
        let key = format!("{}@{}:{}", user.unwrap_or(""), host, port);

        if let Some(session) = self.sessions.lock().get(&key) {
            return Ok(Arc::clone(session));
        }

        let user = user
            .map(str::to_string)
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "root".to_string());

        let config = SessionConfig::new(host, user)
            .port(port)
            .trust_on_first_use(self.trust_on_first_use);

        let session = Arc::new(Session::connect(config).await.map_err(|e| ExecError::Ssh {
            host: host.to_string(),
            source: e,
        })?);

        // A concurrent connect to the same host may have won the race; keep
        // whichever landed first and drop the duplicate.
        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(key).or_insert_with(|| Arc::clone(&session));
        Ok(Arc::clone(entry))
    }

    /// Disconnect all cached sessions.
    pub async fn disconnect_all(&self) {
        let sessions: Vec<Arc<Session>> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in sessions {
            if let Err(e) = session.disconnect().await {
                tracing::warn!("SSH disconnect failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(
        &self,
        target: &Target,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ExecError> {
        match target {
            Target::Local { .. } => self.local.run_local(command, timeout).await,
            Target::Remote {
                host, port, user, ..
            } => {
                let session = self.session_for(host, *port, user.as_deref()).await?;
                tracing::debug!(host = %host, command, "running remote command");

                let output = session
                    .exec_with_timeout(command, timeout)
                    .await
                    .map_err(|e| match e {
                        crate::ssh::Error::CommandTimeout(d) => ExecError::Timeout(d),
                        other => ExecError::Ssh {
                            host: host.clone(),
                            source: other,
                        },
                    })?;

                Ok(ExecOutput {
                    exit_code: output.exit_code as i32,
                    stdout: output.stdout,
                    stderr: output.stderr,
                })
            }
        }
    }
}
