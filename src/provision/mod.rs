// ABOUTME: Provisioner seam for tier auto-provisioning against cloud APIs.
// ABOUTME: Readiness waits with bounded exponential backoff; DNS waits are non-fatal.

use crate::exec::{LocalExecutor, RemoteExecutor};
use crate::types::{ServerRef, SiteName, Target, Tier};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("no provisioner configured; create tier {tier} of {site} manually or wire one in")]
    NoProvider { site: SiteName, tier: Tier },

    #[error("provisioning API call failed: {0}")]
    Api(String),

    #[error("server {server} not ready after {attempts} readiness checks")]
    NotReady { server: ServerRef, attempts: u32 },
}

/// What to provision for a tier.
#[derive(Debug, Clone)]
pub struct ServerSpec {
    pub site: SiteName,
    pub tier: Tier,
    pub domain: String,
}

/// Abstract interface to a cloud provider. Implemented externally; the
/// engine only creates, polls, and deletes.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn create_server(&self, spec: &ServerSpec) -> Result<ServerRef, ProvisionError>;

    async fn delete_server(&self, server: &ServerRef) -> Result<(), ProvisionError>;

    async fn check_ready(&self, server: &ServerRef) -> Result<bool, ProvisionError>;
}

/// Default provisioner: every create fails with a clear message. Real
/// cloud-provider implementations are injected through the library API.
#[derive(Debug, Default)]
pub struct NullProvisioner;

#[async_trait]
impl Provisioner for NullProvisioner {
    async fn create_server(&self, spec: &ServerSpec) -> Result<ServerRef, ProvisionError> {
        Err(ProvisionError::NoProvider {
            site: spec.site.clone(),
            tier: spec.tier,
        })
    }

    async fn delete_server(&self, _server: &ServerRef) -> Result<(), ProvisionError> {
        Ok(())
    }

    async fn check_ready(&self, _server: &ServerRef) -> Result<bool, ProvisionError> {
        Ok(false)
    }
}

/// Poll `check_ready` with exponential backoff until it reports ready or
/// the attempt budget is exhausted. API errors count as attempts; a flaky
/// control plane should not abort provisioning outright.
pub async fn wait_ready<P: Provisioner + ?Sized>(
    provisioner: &P,
    server: &ServerRef,
    retries: u32,
    base_backoff: Duration,
) -> Result<(), ProvisionError> {
    let mut delay = base_backoff;

    for attempt in 1..=retries {
        match provisioner.check_ready(server).await {
            Ok(true) => {
                tracing::debug!(%server, attempt, "server ready");
                return Ok(());
            }
            Ok(false) => {
                tracing::debug!(%server, attempt, "server not ready yet");
            }
            Err(e) => {
                tracing::warn!(%server, attempt, "readiness check failed: {e}");
            }
        }

        if attempt < retries {
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(2);
        }
    }

    Err(ProvisionError::NotReady {
        server: server.clone(),
        attempts: retries,
    })
}

/// Outcome of a DNS propagation wait. Expiry is deliberately not an error:
/// the transition completes and the operator follows up manually.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsOutcome {
    Propagated,
    TimedOut { domain: String },
}

/// Poll local resolution of `domain` from the control machine until it
/// resolves or the timeout passes.
pub async fn wait_dns(domain: &str, timeout: Duration) -> DnsOutcome {
    const POLL_INTERVAL: Duration = Duration::from_secs(5);

    let executor = LocalExecutor::new();
    let target = Target::local(".");
    let probe = format!(r#"getent hosts "{domain}" >/dev/null"#);
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Ok(output) = executor.run(&target, &probe, POLL_INTERVAL).await
            && output.success()
        {
            return DnsOutcome::Propagated;
        }

        if tokio::time::Instant::now() + POLL_INTERVAL > deadline {
            return DnsOutcome::TimedOut {
                domain: domain.to_string(),
            };
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
