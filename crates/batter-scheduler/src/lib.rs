//! Scheduler, builder and trigger derivation for batter.
//!
//! Compiles registered build targets into the flat poller, scheduler and
//! builder lists an execution engine consumes, and drives a builder's steps
//! against that engine.

pub mod conditional;
pub mod manager;
pub mod nightly;
pub mod plan;
pub mod rules;
pub mod runner;

pub use conditional::{ConditionalTrigger, resolve_wait};
pub use manager::{BuildManager, Matrix};
pub use plan::TargetPlan;
pub use rules::BuildRules;
pub use runner::{PipelineEvent, PipelineResult, PipelineRunner, StepState};
