//! Source branches of a build target.

use serde::{Deserialize, Serialize};

use crate::engine::PollerSpec;
use crate::naming::repo_id;
use crate::step::{Checkout, Step};
use crate::target::{BuildTarget, TargetIndex};

/// Default poll interval for Subversion branches.
pub const DEFAULT_SVN_POLL_SECS: u64 = 20 * 60;

/// Version control system backing a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Vcs {
    /// Subversion; the branch named `trunk` is the mainline.
    Svn,
    /// Git; the branch tracking `master` upstream is the mainline.
    Git { upstream: String },
}

impl Vcs {
    pub fn kind(&self) -> &'static str {
        match self {
            Vcs::Svn => "svn",
            Vcs::Git { .. } => "git",
        }
    }
}

/// A branch as declared in configuration, before it is linked to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSpec {
    pub name: String,
    pub vcs: Vcs,
    pub url: Option<String>,
    /// Poll interval in seconds; 0 disables polling.
    pub poll_interval_secs: u64,
}

impl BranchSpec {
    pub fn svn(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vcs: Vcs::Svn,
            url: Some(url.into()),
            poll_interval_secs: DEFAULT_SVN_POLL_SECS,
        }
    }

    pub fn git(
        name: impl Into<String>,
        url: impl Into<String>,
        upstream: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vcs: Vcs::Git {
                upstream: upstream.into(),
            },
            url: Some(url.into()),
            poll_interval_secs: 0,
        }
    }
}

/// A branch owned by exactly one registered target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
    pub vcs: Vcs,
    pub url: Option<String>,
    pub poll_interval_secs: u64,
    target: TargetIndex,
}

impl Branch {
    pub(crate) fn link(spec: BranchSpec, target: TargetIndex) -> Self {
        Self {
            name: spec.name,
            vcs: spec.vcs,
            url: spec.url,
            poll_interval_secs: spec.poll_interval_secs,
            target,
        }
    }

    /// Index of the owning target in the manager's arena.
    pub fn target(&self) -> TargetIndex {
        self.target
    }

    /// Whether this is the mainline branch of its repository.
    pub fn is_head(&self) -> bool {
        match &self.vcs {
            Vcs::Svn => self.name == "trunk",
            Vcs::Git { upstream } => upstream == "master",
        }
    }

    /// Polling configuration for this branch, if polling is enabled.
    pub fn poll_descriptor(&self, owner: &BuildTarget) -> Option<PollerSpec> {
        debug_assert_eq!(owner.index, self.target);

        let url = self.url.as_ref().filter(|u| !u.is_empty())?;
        if self.poll_interval_secs == 0 {
            return None;
        }

        Some(PollerSpec {
            repo_id: repo_id(&owner.name, &self.name),
            vcs: self.vcs.kind().to_string(),
            url: url.clone(),
            interval_secs: self.poll_interval_secs,
        })
    }

    /// Checkout step for this branch into `workdir`.
    pub fn checkout_step(&self, owner: &BuildTarget, workdir: &str) -> Step {
        debug_assert_eq!(owner.index, self.target);

        let upstream = match &self.vcs {
            Vcs::Git { upstream } => Some(upstream.clone()),
            Vcs::Svn => None,
        };

        Step::Checkout(Checkout {
            vcs: self.vcs.kind().to_string(),
            repo_id: repo_id(&owner.name, &self.name),
            url: self.url.clone().unwrap_or_default(),
            upstream,
            workdir: workdir.to_string(),
            mode: "update".to_string(),
            always_use_latest: true,
            allow_patch: matches!(self.vcs, Vcs::Svn),
        })
    }
}
