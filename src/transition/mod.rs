// ABOUTME: Transition engine: definitions, durable step tracking, and the executor.
// ABOUTME: One transition at a time per (site, tier), enforced by the tier lock.

mod definition;
mod error;
mod executor;
mod tracker;

pub use definition::{
    Precondition, Step, StepKind, SyncEndpoint, TargetRole, TemplateContext,
    TransitionDefinition, TransitionRegistry, Verify,
};
pub use error::TransitionError;
pub use executor::{ExecuteOptions, StepOutcome, TransitionExecutor, TransitionReport};
pub use tracker::{PendingSequence, StepRecord, StepStatus, StepTracker, TrackerError};
