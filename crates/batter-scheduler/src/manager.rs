//! Registration and aggregation of build targets.

use batter_config::{Manifest, WorkerRoster};
use batter_core::engine::{BuilderSpec, PollerSpec, SchedulerSpec};
use batter_core::naming::repo_id;
use batter_core::{Branch, BuildTarget, Combination, Error, Result, TargetIndex, TargetSpec};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::plan::TargetPlan;

/// The axes every target is expanded over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matrix {
    /// Interpreter versions, in declared order.
    pub versions: Vec<String>,
    /// The primary build axis, in declared order.
    pub combinations: Vec<Combination>,
    /// Workers able to build each version.
    pub workers: BTreeMap<String, Vec<String>>,
}

/// An immutable, fully linked set of build targets.
///
/// Targets live in registration order; branches refer back to their target
/// by [`TargetIndex`].
#[derive(Debug, Clone)]
pub struct BuildManager {
    matrix: Matrix,
    targets: Vec<BuildTarget>,
}

impl BuildManager {
    /// Link `specs` into a manager, validating cross-target references.
    pub fn register(matrix: Matrix, specs: Vec<TargetSpec>) -> Result<Self> {
        let mut targets: Vec<BuildTarget> = Vec::with_capacity(specs.len());

        for (idx, spec) in specs.into_iter().enumerate() {
            if targets.iter().any(|t| t.name == spec.name) {
                return Err(Error::Duplicate(format!("target '{}'", spec.name)));
            }
            targets.push(BuildTarget::link(TargetIndex::new(idx), spec));
        }

        let manager = Self { matrix, targets };
        manager.validate()?;

        info!(
            targets = manager.targets.len(),
            combinations = manager.matrix.combinations.len(),
            versions = manager.matrix.versions.len(),
            "Registered build targets"
        );

        Ok(manager)
    }

    /// Register the targets of a parsed manifest against a worker roster.
    pub fn from_manifest(manifest: Manifest, roster: &WorkerRoster) -> Result<Self> {
        let matrix = Matrix {
            versions: manifest.versions,
            combinations: manifest.combinations,
            workers: roster.by_version(),
        };
        Self::register(matrix, manifest.targets)
    }

    fn validate(&self) -> Result<()> {
        for target in &self.targets {
            let mut branch_names = HashSet::new();
            for branch in &target.branches {
                if !branch_names.insert(branch.name.as_str()) {
                    return Err(Error::Duplicate(format!(
                        "branch '{}' of target '{}'",
                        branch.name, target.name
                    )));
                }
            }

            for name in target.triggers.iter().chain(&target.dependencies) {
                if self.target(name).is_none() {
                    return Err(Error::InvalidReference(format!(
                        "target '{}' refers to unknown target '{}'",
                        target.name, name
                    )));
                }
            }
        }

        for combination in &self.matrix.combinations {
            if self.target(&combination.primary).is_none() {
                return Err(Error::UnknownTarget(format!(
                    "{} (owner of combination '{}')",
                    combination.primary, combination
                )));
            }
        }

        for version in &self.matrix.versions {
            if self.worker_for(version).is_none() {
                debug!(version = %version, "No worker registered for version; skipping its cells");
            }
        }

        let mut repos = HashMap::new();
        for target in &self.targets {
            for branch in &target.branches {
                let repo = repo_id(&target.name, &branch.name);
                if let Some(other) = repos.insert(repo.clone(), target.name.as_str()) {
                    return Err(Error::Duplicate(format!(
                        "repository '{}' (targets '{}' and '{}')",
                        repo, other, target.name
                    )));
                }
            }
        }

        let mut seen = HashSet::new();
        for builder in self.builders() {
            if !seen.insert(builder.name.clone()) {
                return Err(Error::Duplicate(format!("builder '{}'", builder.name)));
            }
        }

        let mut seen = HashSet::new();
        for scheduler in self.schedulers() {
            if !seen.insert(scheduler.name().to_string()) {
                return Err(Error::Duplicate(format!("scheduler '{}'", scheduler.name())));
            }
        }

        Ok(())
    }

    pub fn targets(&self) -> &[BuildTarget] {
        &self.targets
    }

    pub fn target(&self, name: &str) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn get(&self, index: TargetIndex) -> &BuildTarget {
        &self.targets[index.get()]
    }

    /// The target a branch belongs to.
    pub fn owner(&self, branch: &Branch) -> &BuildTarget {
        self.get(branch.target())
    }

    pub fn combinations(&self) -> &[Combination] {
        &self.matrix.combinations
    }

    pub fn versions(&self) -> &[String] {
        &self.matrix.versions
    }

    /// Versions with at least one registered worker, in declared order.
    pub fn supported_versions(&self) -> impl Iterator<Item = &str> + '_ {
        self.matrix
            .versions
            .iter()
            .map(String::as_str)
            .filter(|v| self.worker_for(v).is_some())
    }

    /// The worker that runs builders for `version`.
    pub fn worker_for(&self, version: &str) -> Option<&str> {
        self.matrix
            .workers
            .get(version)
            .and_then(|workers| workers.first())
            .map(String::as_str)
    }

    pub fn plan<'a>(&'a self, target: &'a BuildTarget) -> TargetPlan<'a> {
        TargetPlan::new(self, target)
    }

    /// Pollers of every branch that has polling enabled.
    pub fn pollers(&self) -> Vec<PollerSpec> {
        self.targets
            .iter()
            .flat_map(|target| {
                target
                    .branches
                    .iter()
                    .filter_map(move |branch| branch.poll_descriptor(target))
            })
            .collect()
    }

    /// Every scheduler: nightly first, then continuous, then sandbox.
    pub fn schedulers(&self) -> Vec<SchedulerSpec> {
        let mut schedulers = Vec::new();

        for target in &self.targets {
            schedulers.extend(self.plan(target).nightly_schedulers());
        }

        for target in &self.targets {
            schedulers.extend(self.plan(target).continuous_schedulers());
        }

        for target in &self.targets {
            schedulers.extend(self.plan(target).sandbox_scheduler());
        }

        schedulers
    }

    /// Every builder, sandbox builders last.
    ///
    /// Builders are emitted dependency-target-first: targets are visited in
    /// reverse registration order, since an earlier target may be the
    /// trigger destination of a later one.
    pub fn builders(&self) -> Vec<BuilderSpec> {
        let mut builders = Vec::new();
        let mut sandbox_builders = Vec::new();

        for target in self.targets.iter().rev() {
            let plan = self.plan(target);

            for combination in &self.matrix.combinations {
                for version in &self.matrix.versions {
                    builders.extend(plan.builders(combination, version, false));
                    sandbox_builders.extend(plan.builders(combination, version, true));
                }
            }
        }

        builders.extend(sandbox_builders);
        builders
    }

    /// Log trigger references that can never fire because the destination
    /// has no triggerable scheduler for a cell.
    pub fn warn_dangling_triggers(&self) {
        for target in &self.targets {
            for trigger in &target.triggers {
                let Some(downstream) = self.target(trigger) else {
                    continue;
                };
                if downstream.is_nightly() || !downstream.has_rules() {
                    warn!(
                        target = %target.name,
                        trigger = %trigger,
                        "Trigger destination has no triggerable schedulers"
                    );
                }
            }
        }
    }
}
