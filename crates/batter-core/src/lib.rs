//! Core domain types and traits for batter.
//!
//! This crate contains:
//! - Combinations, branches and build targets
//! - The builder identity function and the other naming helpers
//! - Build rule configuration records
//! - Engine-facing records (pollers, schedulers, builders, steps)
//! - Executor and trigger traits implemented by the execution engine

pub mod branch;
pub mod combination;
pub mod engine;
pub mod error;
pub mod executor;
pub mod id;
pub mod naming;
pub mod rules;
pub mod step;
pub mod target;

pub use branch::{Branch, BranchSpec, Vcs};
pub use combination::Combination;
pub use error::{Error, Result};
pub use id::ResourceId;
pub use target::{BuildTarget, NightlySchedule, TargetIndex, TargetSpec};
