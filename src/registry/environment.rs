// ABOUTME: Environment records: which tiers exist for a site and where.
// ABOUTME: Created on first provisioning, destroyed only by explicit deprovision.

use crate::types::{ServerRef, SiteName, Target, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a tier environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvStatus {
    /// Not yet created; transitions into it require provisioning.
    Absent,
    /// Creation started but not finished (server up, DNS pending, ...).
    Provisioning,
    /// Fully created and serving.
    Active,
}

/// One tier of one site: identity, binding, and lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub site: SiteName,
    pub tier: Tier,
    pub target: Target,
    pub domain: String,
    pub status: EnvStatus,
    /// Provisioner handle, present when the tier was auto-provisioned.
    #[serde(default)]
    pub server: Option<ServerRef>,
    pub updated_at: DateTime<Utc>,
}

impl Environment {
    /// A record for a tier that does not exist yet, carrying its declared
    /// binding so provisioning knows where to put it.
    pub fn absent(site: SiteName, tier: Tier, target: Target, domain: String) -> Self {
        Self {
            site,
            tier,
            target,
            domain,
            status: EnvStatus::Absent,
            server: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EnvStatus::Active
    }

    pub fn with_status(mut self, status: EnvStatus) -> Self {
        self.status = status;
        self.updated_at = Utc::now();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_environment_is_not_active() {
        let env = Environment::absent(
            SiteName::new("s1").unwrap(),
            Tier::Stg,
            Target::local("/tmp/stg"),
            "stg.s1.test".to_string(),
        );
        assert_eq!(env.status, EnvStatus::Absent);
        assert!(!env.is_active());
    }

    #[test]
    fn with_status_advances_timestamp() {
        let env = Environment::absent(
            SiteName::new("s1").unwrap(),
            Tier::Stg,
            Target::local("/tmp/stg"),
            "stg.s1.test".to_string(),
        );
        let before = env.updated_at;
        let active = env.with_status(EnvStatus::Active);
        assert!(active.is_active());
        assert!(active.updated_at >= before);
    }
}
