//! Records consumed by the execution engine.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::executor::PropertyMap;
use crate::step::Step;

/// A change poller for one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerSpec {
    pub repo_id: String,
    pub vcs: String,
    pub url: String,
    pub interval_secs: u64,
}

/// A change reported by a poller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Repository identity of the poller that saw the change, if any.
    pub repo_id: Option<String>,
    pub revision: String,
    pub author: String,
}

/// A scheduler definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerSpec {
    /// Fires only when invoked by name from a trigger step.
    Triggerable {
        name: String,
        builder_names: Vec<String>,
    },
    /// Fires after changes to one of `repo_ids` have been quiet for
    /// `tree_stable_timer_secs`.
    RepoChange {
        name: String,
        repo_ids: Vec<String>,
        tree_stable_timer_secs: u64,
        builder_names: Vec<String>,
    },
    /// Fires once a day at `at`.
    Nightly {
        name: String,
        at: NaiveTime,
        builder_names: Vec<String>,
    },
    /// Accepts manually submitted sandbox jobs from `jobdir`.
    TryJobdir {
        name: String,
        jobdir: String,
        builder_names: Vec<String>,
    },
}

impl SchedulerSpec {
    pub fn name(&self) -> &str {
        match self {
            SchedulerSpec::Triggerable { name, .. }
            | SchedulerSpec::RepoChange { name, .. }
            | SchedulerSpec::Nightly { name, .. }
            | SchedulerSpec::TryJobdir { name, .. } => name,
        }
    }

    pub fn builder_names(&self) -> &[String] {
        match self {
            SchedulerSpec::Triggerable { builder_names, .. }
            | SchedulerSpec::RepoChange { builder_names, .. }
            | SchedulerSpec::Nightly { builder_names, .. }
            | SchedulerSpec::TryJobdir { builder_names, .. } => builder_names,
        }
    }

    /// Whether a change should start this scheduler's timer.
    ///
    /// Only change schedulers accept changes. A change without a repository
    /// identity is accepted by all of them.
    pub fn accepts_change(&self, change: &ChangeEvent) -> bool {
        match self {
            SchedulerSpec::RepoChange { repo_ids, .. } => change
                .repo_id
                .as_ref()
                .is_none_or(|repo| repo_ids.contains(repo)),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Builds,
    Sandbox,
}

/// A builder definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderSpec {
    pub name: String,
    pub worker: String,
    pub build_dir: String,
    pub workdir: String,
    pub steps: Vec<Step>,
    pub category: Category,
    /// Properties every build of this builder starts with.
    pub properties: PropertyMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(repo_id: Option<&str>) -> ChangeEvent {
        ChangeEvent {
            repo_id: repo_id.map(String::from),
            revision: "1234".to_string(),
            author: "chipx86".to_string(),
        }
    }

    #[test]
    fn test_repo_change_filter() {
        let scheduler = SchedulerSpec::RepoChange {
            name: "core_trunk".to_string(),
            repo_ids: vec!["core_trunk".to_string()],
            tree_stable_timer_secs: 60,
            builder_names: vec!["core_py2.6".to_string()],
        };

        assert!(scheduler.accepts_change(&change(Some("core_trunk"))));
        assert!(!scheduler.accepts_change(&change(Some("core_dev"))));
        assert!(scheduler.accepts_change(&change(None)));
    }

    #[test]
    fn test_triggerable_ignores_changes() {
        let scheduler = SchedulerSpec::Triggerable {
            name: "triggered_core_core_trunk_py2.6".to_string(),
            builder_names: vec!["core_py2.6".to_string()],
        };
        assert!(!scheduler.accepts_change(&change(None)));
        assert_eq!(scheduler.name(), "triggered_core_core_trunk_py2.6");
    }

    #[test]
    fn test_scheduler_serializes_with_type_tag() {
        let scheduler = SchedulerSpec::Nightly {
            name: "nightly_core_core_trunk".to_string(),
            at: NaiveTime::from_hms_opt(1, 30, 0).unwrap(),
            builder_names: vec![],
        };
        let json = serde_json::to_value(&scheduler).unwrap();
        assert_eq!(json["type"], "nightly");
        assert_eq!(json["at"], "01:30:00");
    }
}
