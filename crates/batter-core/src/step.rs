//! Step descriptors handed to the execution engine.
//!
//! Steps are descriptions only; the engine performs them. Values may
//! contain `${property}` expressions that are rendered when the step runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One step of a builder's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Checkout(Checkout),
    Virtualenv {
        python: String,
    },
    EasyInstall {
        packages: Vec<String>,
        find_links: Vec<String>,
        env: BTreeMap<String, String>,
    },
    /// Run `command` and store its output in `property`.
    SetProperty {
        property: String,
        command: Vec<String>,
        workdir: String,
    },
    Test {
        command: Vec<String>,
        workdir: String,
        env: BTreeMap<String, String>,
        flunk_on_warnings: bool,
    },
    PythonDist(PythonDist),
    Upload(Upload),
    Trigger(TriggerStep),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Checkout(_) => "checkout",
            Step::Virtualenv { .. } => "virtualenv",
            Step::EasyInstall { .. } => "easy_install",
            Step::SetProperty { .. } => "set_property",
            Step::Test { .. } => "test",
            Step::PythonDist(dist) => dist.kind.dist_type(),
            Step::Upload(_) => "upload",
            Step::Trigger(_) => "trigger",
        }
    }

    /// Shell command for steps the engine runs as a command.
    ///
    /// `nightly` selects the egg_info tagging of dist builds. Checkout,
    /// upload and trigger steps are engine-native and have no command.
    pub fn command(&self, nightly: bool) -> Option<Vec<String>> {
        match self {
            Step::Virtualenv { python } => Some(vec![
                python.clone(),
                "../../virtualenv".to_string(),
                "--no-site-packages".to_string(),
                "./".to_string(),
            ]),
            Step::EasyInstall {
                packages,
                find_links,
                ..
            } => {
                let mut command: Vec<String> = ["easy_install", "--upgrade", "--prefix", "."]
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                if !find_links.is_empty() {
                    command.push("--find-links".to_string());
                    command.push(find_links.join(" "));
                }
                command.extend(packages.iter().cloned());
                Some(command)
            }
            Step::SetProperty { command, .. } | Step::Test { command, .. } => {
                Some(command.clone())
            }
            Step::PythonDist(dist) => Some(dist.command(nightly)),
            Step::Checkout(_) | Step::Upload(_) | Step::Trigger(_) => None,
        }
    }
}

/// Checkout of one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub vcs: String,
    /// Repository identity, `<target>_<branch>`.
    pub repo_id: String,
    pub url: String,
    /// Upstream branch for git checkouts.
    pub upstream: Option<String>,
    pub workdir: String,
    pub mode: String,
    pub always_use_latest: bool,
    /// Apply patches submitted with sandbox builds.
    pub allow_patch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistKind {
    Sdist,
    Egg,
}

impl DistKind {
    pub fn dist_type(self) -> &'static str {
        match self {
            DistKind::Sdist => "sdist",
            DistKind::Egg => "egg",
        }
    }

    pub fn dist_command(self) -> &'static str {
        match self {
            DistKind::Sdist => "sdist",
            DistKind::Egg => "bdist_egg",
        }
    }

    /// Property the built file name is stored in.
    pub fn filename_property(self) -> &'static str {
        match self {
            DistKind::Sdist => "sdist_filename",
            DistKind::Egg => "egg_filename",
        }
    }
}

/// A `setup.py` distribution build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonDist {
    pub kind: DistKind,
    pub workdir: String,
    pub use_egg_info: bool,
    pub env: BTreeMap<String, String>,
}

impl PythonDist {
    pub fn command(&self, nightly: bool) -> Vec<String> {
        let mut command = vec!["python".to_string(), "setup.py".to_string()];

        if self.use_egg_info {
            command.push("egg_info".to_string());
            // Nightly builds carry a date tag; continuous builds a revision tag.
            command.push(if nightly { "-dR" } else { "-Dr" }.to_string());
        }

        command.push(self.kind.dist_command().to_string());
        command
    }
}

/// Upload of a built file to the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// Property holding the name of the file under `dist/`.
    pub filename_property: String,
    pub default_path: String,
    pub workdir: String,
}

impl Upload {
    /// Destination template, rendered at run time.
    pub fn destination(&self, upload_path: Option<&str>) -> String {
        let base = upload_path
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default_path);
        format!("{}/${{{}}}", base.trim_end_matches('/'), self.filename_property)
    }

    pub fn source(&self) -> String {
        format!("dist/${{{}}}", self.filename_property)
    }
}

/// Invocation of downstream triggerable schedulers.
///
/// `wait_for_triggers` is the statically configured wait flag; the flag used
/// for an actual invocation is resolved at run time from the `nightly`
/// property, defaulting to `nightly_default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerStep {
    pub scheduler_names: Vec<String>,
    pub wait_for_triggers: bool,
    pub nightly_default: bool,
    /// Properties passed to the triggered builds, as templates.
    pub set_properties: BTreeMap<String, String>,
}
