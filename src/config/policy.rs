// ABOUTME: Tunable engine policies with documented defaults.
// ABOUTME: Thresholds the source material leaves open are all surfaced here.

use serde::Deserialize;
use std::time::Duration;

/// Engine behavior knobs. Every duration accepts humantime strings ("1h",
/// "30s") in terrace.yml.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Provision an absent tier automatically before a transition needs it.
    pub auto_provision: bool,

    /// Allow auto-provisioning specifically for the optional live tier.
    pub auto_live: bool,

    /// Age after which a held lock is reported as stale. Stale locks are
    /// never cleared automatically; `terrace unlock` is the only way.
    #[serde(with = "humantime_serde")]
    pub stale_lock_after: Duration,

    /// How long after a swap the rollback window stays open.
    #[serde(with = "humantime_serde")]
    pub rollback_retention: Duration,

    /// Readiness poll attempts after create_server.
    pub provision_retries: u32,

    /// Base delay between readiness polls; doubles each attempt.
    #[serde(with = "humantime_serde")]
    pub provision_backoff: Duration,

    /// Total time to wait for DNS propagation. Expiry is non-fatal.
    #[serde(with = "humantime_serde")]
    pub dns_timeout: Duration,

    /// Timeout for each step command.
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            auto_provision: true,
            auto_live: true,
            stale_lock_after: Duration::from_secs(60 * 60),
            rollback_retention: Duration::from_secs(24 * 60 * 60),
            provision_retries: 8,
            provision_backoff: Duration::from_secs(2),
            dns_timeout: Duration::from_secs(5 * 60),
            command_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Pre-swap health gate for the staged copy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Release marker file that must exist in the staged slot.
    pub marker: String,

    /// Optional command run on the tier target; exit 0 means healthy.
    pub command: Option<String>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            marker: ".release".to_string(),
            command: None,
        }
    }
}
