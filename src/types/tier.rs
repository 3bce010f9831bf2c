// ABOUTME: Deployment tier enum and parsing.
// ABOUTME: Tiers form the nodes of the transition graph: dev, stg, live, prod.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown tier '{0}' (expected dev, stg, live, or prod)")]
pub struct TierParseError(String);

/// A deployment environment tier for a site.
///
/// `live` is optional; sites commonly run with only dev/stg/prod and the
/// `stg2prod` shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Dev,
    Stg,
    Live,
    Prod,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Dev, Tier::Stg, Tier::Live, Tier::Prod];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Dev => "dev",
            Tier::Stg => "stg",
            Tier::Live => "live",
            Tier::Prod => "prod",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = TierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Tier::Dev),
            "stg" | "staging" => Ok(Tier::Stg),
            "live" => Ok(Tier::Live),
            "prod" | "production" => Ok(Tier::Prod),
            other => Err(TierParseError(other.to_string())),
        }
    }
}
