// ABOUTME: Configuration types and parsing for terrace.yml.
// ABOUTME: Handles YAML parsing, discovery, and the state directory location.

mod init;
mod policy;
mod site;

pub use init::init_config;
pub use policy::{HealthConfig, PolicyConfig};
pub use site::{SiteConfig, TierBinding};

use crate::error::{Error, Result};
use crate::types::{SiteName, Tier};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "terrace.yml";
pub const CONFIG_FILENAME_ALT: &str = "terrace.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".terrace/config.yml";

/// Default state directory relative to $HOME (XDG Base Directory compliant).
const STATE_DIR: &str = ".local/state/terrace";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Where journals, locks, environment records, and snapshots live.
    /// Defaults to ~/.local/state/terrace.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    pub sites: HashMap<SiteName, SiteConfig>,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub health: HealthConfig,

    /// Accept unknown SSH host keys on first connection.
    #[serde(default)]
    pub trust_first_connection: bool,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Resolve the state directory, defaulting under $HOME.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return dir.clone();
        }
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Path::new(&home).join(STATE_DIR)
    }

    pub fn site(&self, name: &SiteName) -> Result<&SiteConfig> {
        self.sites
            .get(name)
            .ok_or_else(|| Error::UnknownSite(name.to_string()))
    }

    /// Binding for a (site, tier), or a validation error naming both.
    pub fn binding(&self, site: &SiteName, tier: Tier) -> Result<&TierBinding> {
        self.site(site)?
            .binding(tier)
            .ok_or_else(|| Error::UnboundTier {
                site: site.to_string(),
                tier,
            })
    }

    pub fn template() -> Self {
        let yaml = r#"
sites:
  my-site:
    tiers:
      dev:
        root: /var/www/my-site/dev
        domain: dev.my-site.example
      stg:
        root: /var/www/my-site/stg
        domain: stg.my-site.example
      prod:
        host: prod1.example.com
        user: deploy
        root: /srv/my-site
        domain: my-site.example
"#;
        Self::from_yaml(yaml).expect("template config is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_and_resolves_bindings() {
        let config = Config::template();
        let site = SiteName::new("my-site").unwrap();

        assert!(config.binding(&site, Tier::Dev).is_ok());
        assert!(config.binding(&site, Tier::Prod).is_ok());
        assert!(config.binding(&site, Tier::Live).is_err());
    }

    #[test]
    fn unknown_site_is_an_error() {
        let config = Config::template();
        let missing = SiteName::new("nope").unwrap();
        assert!(matches!(config.site(&missing), Err(Error::UnknownSite(_))));
    }

    #[test]
    fn state_dir_defaults_under_home() {
        let config = Config::template();
        assert!(config.state_dir().ends_with(".local/state/terrace"));
    }

    #[test]
    fn explicit_state_dir_wins() {
        let mut config = Config::template();
        config.state_dir = Some(PathBuf::from("/tmp/terrace-state"));
        assert_eq!(config.state_dir(), PathBuf::from("/tmp/terrace-state"));
    }

    #[test]
    fn policy_block_is_optional() {
        let yaml = r#"
sites:
  s1:
    tiers:
      dev:
        root: /tmp/dev
        domain: dev.s1.test
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.policy.auto_provision);
    }
}
