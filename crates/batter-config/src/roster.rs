//! Worker roster parsing.
//!
//! The roster lists one worker per line as tab-separated
//! `name<TAB>version[<TAB>secret]`. Lines starting with `#` and blank lines
//! are ignored. The secret column is accepted for compatibility with
//! existing roster files and discarded; worker credentials are managed by
//! the execution engine.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::{ConfigError, ConfigResult};

/// A worker able to build for one interpreter version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerEntry {
    pub name: String,
    pub version: String,
}

/// All known workers, in roster order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerRoster {
    entries: Vec<WorkerEntry>,
}

impl WorkerRoster {
    /// Parse roster text.
    pub fn parse(text: &str) -> ConfigResult<Self> {
        let mut entries: Vec<WorkerEntry> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.splitn(3, '\t');
            let name = fields.next().unwrap_or_default().trim();
            let version = fields.next().map(str::trim).unwrap_or_default();

            if name.is_empty() || version.is_empty() {
                return Err(ConfigError::Roster {
                    line: idx + 1,
                    message: "expected name<TAB>version[<TAB>secret]".to_string(),
                });
            }

            if entries.iter().any(|e| e.name == name) {
                return Err(ConfigError::Roster {
                    line: idx + 1,
                    message: format!("worker '{}' listed twice", name),
                });
            }

            entries.push(WorkerEntry {
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        debug!(workers = entries.len(), "Parsed worker roster");
        Ok(Self { entries })
    }

    /// Read and parse a roster file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn entries(&self) -> &[WorkerEntry] {
        &self.entries
    }

    /// Worker names grouped by version, each group in roster order.
    pub fn by_version(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in &self.entries {
            map.entry(entry.version.clone())
                .or_default()
                .push(entry.name.clone());
        }
        map
    }
}
