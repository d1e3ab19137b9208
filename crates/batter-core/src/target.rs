//! Build targets.

use chrono::NaiveTime;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::branch::{Branch, BranchSpec};
use crate::combination::Combination;
use crate::naming;
use crate::rules::BuildRulesConfig;

/// Position of a target in the manager's registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display)]
#[display("{_0}")]
pub struct TargetIndex(usize);

impl TargetIndex {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

/// Nightly start time and the offset applied between successive combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightlySchedule {
    pub hour: u32,
    pub minute: u32,
    pub stagger_secs: u64,
}

impl NightlySchedule {
    pub fn at(hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            stagger_secs: 0,
        }
    }

    pub fn with_stagger(mut self, secs: u64) -> Self {
        self.stagger_secs = secs;
        self
    }

    /// Time of day of the first combination, if the hour and minute are valid.
    pub fn start_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0)
    }
}

/// A target as declared in configuration, before registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub name: String,
    pub branches: Vec<BranchSpec>,
    /// Build rules; a target without rules is never built.
    pub rules: Option<BuildRulesConfig>,
    pub dependencies: Vec<String>,
    pub allow_sandbox: bool,
    pub nightly: Option<NightlySchedule>,
    /// Names of targets triggered after a successful build of this one.
    pub triggers: Vec<String>,
    pub wait_for_triggers: bool,
    pub trigger_properties: BTreeMap<String, String>,
    pub excluded: BTreeSet<Combination>,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            branches: Vec::new(),
            rules: None,
            dependencies: Vec::new(),
            allow_sandbox: false,
            nightly: None,
            triggers: Vec::new(),
            wait_for_triggers: false,
            trigger_properties: BTreeMap::new(),
            excluded: BTreeSet::new(),
        }
    }
}

/// A registered target. Owns its branches, each linked back by index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildTarget {
    pub index: TargetIndex,
    pub name: String,
    pub branches: Vec<Branch>,
    pub rules: Option<BuildRulesConfig>,
    pub dependencies: Vec<String>,
    pub allow_sandbox: bool,
    pub nightly: Option<NightlySchedule>,
    pub triggers: Vec<String>,
    pub wait_for_triggers: bool,
    pub trigger_properties: BTreeMap<String, String>,
    pub excluded: BTreeSet<Combination>,
}

impl BuildTarget {
    /// Link a declared target into the arena at `index`.
    pub fn link(index: TargetIndex, spec: TargetSpec) -> Self {
        let branches = spec
            .branches
            .into_iter()
            .map(|branch| Branch::link(branch, index))
            .collect();

        Self {
            index,
            name: spec.name,
            branches,
            rules: spec.rules,
            dependencies: spec.dependencies,
            allow_sandbox: spec.allow_sandbox,
            nightly: spec.nightly,
            triggers: spec.triggers,
            wait_for_triggers: spec.wait_for_triggers,
            trigger_properties: spec.trigger_properties,
            excluded: spec.excluded,
        }
    }

    pub fn is_nightly(&self) -> bool {
        self.nightly.is_some()
    }

    pub fn has_rules(&self) -> bool {
        self.rules.is_some()
    }

    pub fn excludes(&self, combination: &Combination) -> bool {
        self.excluded.contains(combination)
    }

    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    /// Builder name of one cell, or `None` when the cell is excluded,
    /// either explicitly or because the owner's branch does not match.
    pub fn builder_name(
        &self,
        combination: &Combination,
        version: &str,
        branch: Option<&Branch>,
        sandbox: bool,
    ) -> Option<String> {
        if self.excludes(combination) {
            return None;
        }
        naming::builder_name(self, combination, version, branch, sandbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_sets_back_reference() {
        let mut spec = TargetSpec::new("core");
        spec.branches = vec![
            BranchSpec::svn("trunk", "http://svn.example.org/trunk"),
            BranchSpec::svn("dev", "http://svn.example.org/dev"),
        ];

        let target = BuildTarget::link(TargetIndex::new(3), spec);
        assert!(target.branches.iter().all(|b| b.target() == TargetIndex::new(3)));
    }

    #[test]
    fn test_excluded_combination_has_no_name() {
        let mut spec = TargetSpec::new("plugin");
        spec.branches = vec![BranchSpec::svn("trunk", "http://svn.example.org/trunk")];
        spec.excluded.insert(Combination::new("core", "dev"));
        let target = BuildTarget::link(TargetIndex::new(0), spec);

        let branch = &target.branches[0];
        assert!(
            target
                .builder_name(&Combination::new("core", "dev"), "2.6", Some(branch), false)
                .is_none()
        );
        assert_eq!(
            target
                .builder_name(&Combination::new("core", "trunk"), "2.6", Some(branch), false)
                .as_deref(),
            Some("plugin_core_trunk_py2.6")
        );
    }

    #[test]
    fn test_nightly_start_time() {
        assert!(NightlySchedule::at(23, 59).start_time().is_some());
        assert!(NightlySchedule::at(24, 0).start_time().is_none());
    }
}
