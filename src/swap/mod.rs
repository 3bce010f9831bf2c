// ABOUTME: Blue-green swap subsystem: slot permutations, swapper, snapshots, rollback.
// ABOUTME: Alias state is mutated only here, while the tier lock is held.

mod rollback;
mod slots;
mod snapshot;
mod swapper;

pub use rollback::RollbackManager;
pub use slots::{ObservedAliases, Slot, SlotMap};
pub use snapshot::{
    DeploymentSnapshot, SnapshotStatus, SnapshotStore, StoreError, WindowClosed,
};
pub use swapper::BlueGreenSwapper;

use crate::exec::ExecError;
use crate::types::{SiteName, Tier};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SwapError {
    /// The alias mapping matches none of the three valid permutations.
    /// Fatal: requires manual reconciliation before any further swap.
    #[error(
        "partial swap detected on tier {tier} of {site}: aliases read {observed}; \
         reconcile the symlinks manually before swapping again"
    )]
    PartialSwap {
        site: SiteName,
        tier: Tier,
        observed: ObservedAliases,
    },

    /// The copy to be served failed verification; nothing was mutated.
    #[error("health gate failed for tier {tier} of {site}: {detail}")]
    HealthGate {
        site: SiteName,
        tier: Tier,
        detail: String,
    },

    /// A shell primitive failed.
    #[error("failed to {action}: {detail}")]
    Command { action: &'static str, detail: String },

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RollbackError {
    /// Informational: a forward transition is required instead.
    #[error("cannot roll back tier {tier} of {site}: {reason}")]
    WindowExpired {
        site: SiteName,
        tier: Tier,
        reason: WindowClosed,
    },

    #[error(transparent)]
    Swap(#[from] SwapError),
}
