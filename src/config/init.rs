// ABOUTME: Writes a starter terrace.yml into a project directory.
// ABOUTME: Refuses to overwrite an existing file unless forced.

use super::CONFIG_FILENAME;
use crate::error::{Error, Result};
use std::path::Path;

const TEMPLATE: &str = r#"# terrace configuration
#
# Each site declares where its tiers live. A tier without a host is a
# directory on this machine; with a host it is reached over SSH.

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

# policy:
#   auto_provision: true      # provision absent tiers before transitions
#   auto_live: true           # allow auto-provisioning the live tier
#   stale_lock_after: 1h      # locks older than this are reported stale
#   rollback_retention: 24h   # how long a swap stays rollback-able
#   provision_retries: 8      # readiness polls after create_server
#   provision_backoff: 2s     # base poll delay, doubles each attempt
#   dns_timeout: 5m           # DNS propagation wait; expiry is non-fatal
#   command_timeout: 5m       # per-step command timeout

# health:
#   marker: .release          # file that must exist in the staged slot
#   command: "curl -fsS http://localhost/healthz"
"#;

pub fn init_config(dir: &Path, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    std::fs::write(&config_path, TEMPLATE)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn written_template_parses() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.sites.len(), 1);
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), false).unwrap();

        assert!(matches!(
            init_config(dir.path(), false),
            Err(Error::AlreadyExists(_))
        ));
        assert!(init_config(dir.path(), true).is_ok());
    }
}
