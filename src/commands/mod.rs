// ABOUTME: Command handlers wiring config, registry, and executors into the engine.
// ABOUTME: Thin layer: parse-ish glue here, semantics in the library modules.

mod exec_cmd;
mod rollback;
mod run;
mod status;
mod unlock;

pub use exec_cmd::exec;
pub use rollback::rollback;
pub use run::run;
pub use status::status;
pub use unlock::unlock;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{SiteName, Tier};
use std::path::PathBuf;

/// Load config from the working directory and validate the site name.
pub(crate) fn load(site: &str) -> Result<(Config, SiteName, PathBuf)> {
    let cwd = std::env::current_dir()?;
    let config = Config::discover(&cwd)?;
    let site = SiteName::new(site).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    config.site(&site)?;
    Ok((config, site, cwd))
}

pub(crate) fn parse_tier(tier: &str) -> Result<Tier> {
    tier.parse().map_err(|e: crate::types::TierParseError| {
        Error::InvalidConfig(e.to_string())
    })
}
