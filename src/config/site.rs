// ABOUTME: Per-site tier bindings: where each tier lives and which domain it serves.
// ABOUTME: Bindings are static declarations; the registry tracks what actually exists.

use crate::types::{Target, Tier};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Declared tiers for one site.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub tiers: HashMap<Tier, TierBinding>,
}

impl SiteConfig {
    pub fn binding(&self, tier: Tier) -> Option<&TierBinding> {
        self.tiers.get(&tier)
    }
}

/// Where one tier of a site lives. A binding without a host is local to the
/// control machine; with a host it is reached over SSH.
#[derive(Debug, Clone, Deserialize)]
pub struct TierBinding {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    #[serde(default)]
    pub user: Option<String>,

    pub root: PathBuf,

    pub domain: String,
}

fn default_ssh_port() -> u16 {
    22
}

impl TierBinding {
    pub fn target(&self) -> Target {
        match &self.host {
            Some(host) => Target::Remote {
                host: host.clone(),
                port: self.port,
                user: self.user.clone(),
                root: self.root.clone(),
            },
            None => Target::Local {
                root: self.root.clone(),
            },
        }
    }
}
