// ABOUTME: Shared domain types: validated names, tiers, targets, phantom IDs.
// ABOUTME: Everything here is serializable and cheap to clone.

mod id;
mod site_name;
mod target;
mod tier;

pub use id::{Id, ServerRef, SnapshotId, TransitionId};
pub use site_name::{SiteName, SiteNameError};
pub use target::Target;
pub use tier::{Tier, TierParseError};
