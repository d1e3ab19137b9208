//! Declarative input for batter.
//!
//! This crate handles parsing of:
//! - The target manifest (batter.kdl)
//! - The worker roster (workers.cfg)
//! - Build property rendering

pub mod error;
pub mod manifest;
pub mod properties;
pub mod roster;

pub use error::{ConfigError, ConfigResult};
pub use manifest::{Manifest, load_manifest, parse_manifest};
pub use properties::Properties;
pub use roster::{WorkerEntry, WorkerRoster};
