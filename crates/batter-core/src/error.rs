//! Error types for batter.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("duplicate definition: {0}")]
    Duplicate(String),

    #[error("invalid reference: {0}")]
    InvalidReference(String),

    #[error("step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("trigger of {schedulers:?} failed: {message}")]
    TriggerFailed {
        schedulers: Vec<String>,
        message: String,
    },

    #[error("engine error: {0}")]
    Engine(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
