//! Build rule configuration.
//!
//! A target's build rules choose one variant per phase. The phase order is
//! fixed; only what each phase contributes varies.

use serde::{Deserialize, Serialize};

/// Per-phase rule choices for a target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRulesConfig {
    #[serde(default)]
    pub checkout: CheckoutRule,
    #[serde(default)]
    pub environment: EnvironmentRule,
    #[serde(default)]
    pub test: TestRule,
    #[serde(default)]
    pub build: BuildRule,
    #[serde(default)]
    pub upload: UploadRule,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckoutRule {
    /// Check out the cell's branch into the target workdir.
    #[default]
    Branch,
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EnvironmentRule {
    #[default]
    None,
    /// Create a virtualenv for the cell's interpreter and install eggs into it.
    Virtualenv {
        egg_deps: Vec<String>,
        find_links: Vec<String>,
        /// Location built eggs are published to; searched before `find_links`.
        upload_url: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TestRule {
    #[default]
    None,
    Command {
        command: Vec<String>,
        flunk_on_warnings: bool,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BuildRule {
    #[default]
    None,
    /// `setup.py sdist`, plus `bdist_egg` when `build_eggs` is set.
    PythonDist { build_eggs: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UploadRule {
    #[default]
    None,
    /// Upload built dists to the runtime `upload_path` property, falling
    /// back to `default_path`.
    Dist { default_path: String },
}
