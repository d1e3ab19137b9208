//! Scheduler and builder derivation for a single target.

use batter_core::engine::{BuilderSpec, Category, SchedulerSpec};
use batter_core::executor::PropertyMap;
use batter_core::naming::{repo_id, trigger_name};
use batter_core::step::Step;
use batter_core::{BuildTarget, Combination};
use std::collections::HashMap;
use tracing::trace;

use crate::manager::BuildManager;
use crate::nightly::StaggeredClock;
use crate::rules::{BuildRules, CellContext};

/// Quiet period a change scheduler waits for before firing.
pub const TREE_STABLE_TIMER_SECS: u64 = 60;

/// The derivation view of one registered target.
#[derive(Debug, Clone, Copy)]
pub struct TargetPlan<'a> {
    manager: &'a BuildManager,
    target: &'a BuildTarget,
}

impl<'a> TargetPlan<'a> {
    pub fn new(manager: &'a BuildManager, target: &'a BuildTarget) -> Self {
        Self { manager, target }
    }

    /// Triggerable and change schedulers, branch by branch: each branch's
    /// new triggerables, then its change scheduler. Empty for nightly
    /// targets and targets without build rules.
    pub fn continuous_schedulers(&self) -> Vec<SchedulerSpec> {
        let target = self.target;
        if !target.has_rules() || target.is_nightly() {
            return Vec::new();
        }

        let mut schedulers: Vec<SchedulerSpec> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for branch in &target.branches {
            let mut builder_names = Vec::new();

            for version in self.manager.supported_versions() {
                for combination in self.manager.combinations() {
                    let Some(name) =
                        target.builder_name(combination, version, Some(branch), false)
                    else {
                        trace!(
                            target = %target.name,
                            branch = %branch.name,
                            combination = %combination,
                            version = %version,
                            "Skipping cell"
                        );
                        continue;
                    };

                    let scheduler = trigger_name(&target.name, combination, version);
                    match by_name.get(&scheduler) {
                        Some(&idx) => {
                            if let SchedulerSpec::Triggerable { builder_names, .. } =
                                &mut schedulers[idx]
                            {
                                builder_names.push(name.clone());
                            }
                        }
                        None => {
                            by_name.insert(scheduler.clone(), schedulers.len());
                            schedulers.push(SchedulerSpec::Triggerable {
                                name: scheduler,
                                builder_names: vec![name.clone()],
                            });
                        }
                    }

                    builder_names.push(name);
                }
            }

            if builder_names.is_empty() {
                continue;
            }

            let repo = repo_id(&target.name, &branch.name);
            schedulers.push(SchedulerSpec::RepoChange {
                name: repo.clone(),
                repo_ids: vec![repo],
                tree_stable_timer_secs: TREE_STABLE_TIMER_SECS,
                builder_names,
            });
        }

        schedulers
    }

    /// One nightly scheduler per non-excluded combination, each covering
    /// every version and branch, started at staggered times. Combinations
    /// with no buildable cell get no scheduler and no stagger slot.
    pub fn nightly_schedulers(&self) -> Vec<SchedulerSpec> {
        let target = self.target;
        if !target.has_rules() {
            return Vec::new();
        }
        let Some(nightly) = target.nightly else {
            return Vec::new();
        };
        let Some(start) = nightly.start_time() else {
            return Vec::new();
        };

        let mut clock = StaggeredClock::new(start, nightly.stagger_secs);
        let mut schedulers = Vec::new();

        for combination in self.manager.combinations() {
            if target.excludes(combination) {
                continue;
            }

            let builder_names: Vec<String> = self
                .manager
                .supported_versions()
                .flat_map(|version| {
                    target
                        .branches
                        .iter()
                        .filter_map(move |branch| {
                            target.builder_name(combination, version, Some(branch), false)
                        })
                })
                .collect();

            if builder_names.is_empty() {
                trace!(
                    target = %target.name,
                    combination = %combination,
                    "No nightly builders for combination"
                );
                continue;
            }

            let Some(at) = clock.next() else {
                break;
            };

            schedulers.push(SchedulerSpec::Nightly {
                name: format!(
                    "nightly_{}_{}_{}",
                    target.name, combination.primary, combination.variant
                ),
                at,
                builder_names,
            });
        }

        schedulers
    }

    /// The try scheduler accepting sandbox jobs for this target.
    pub fn sandbox_scheduler(&self) -> Option<SchedulerSpec> {
        let target = self.target;
        if !target.allow_sandbox || !target.has_rules() {
            return None;
        }

        let mut builder_names = Vec::new();
        for version in self.manager.supported_versions() {
            for combination in self.manager.combinations() {
                for branch in &target.branches {
                    builder_names.extend(target.builder_name(
                        combination,
                        version,
                        Some(branch),
                        true,
                    ));
                }
            }
        }

        Some(SchedulerSpec::TryJobdir {
            name: format!("sandbox_{}", target.name),
            jobdir: format!("jobdir_{}", target.name),
            builder_names,
        })
    }

    /// Builders of one combination and version, one per surviving branch.
    pub fn builders(
        &self,
        combination: &Combination,
        version: &str,
        sandbox: bool,
    ) -> Vec<BuilderSpec> {
        let target = self.target;
        let Some(rules) = target.rules.as_ref() else {
            return Vec::new();
        };
        if sandbox && !target.allow_sandbox {
            return Vec::new();
        }
        let Some(worker) = self.manager.worker_for(version) else {
            return Vec::new();
        };

        let rules = BuildRules::new(rules);
        target
            .branches
            .iter()
            .filter_map(|branch| {
                let name = target.builder_name(combination, version, Some(branch), sandbox)?;
                let mut ctx = CellContext::new(
                    self.manager,
                    target,
                    branch,
                    combination,
                    version,
                    &target.name,
                );
                Some(self.builder(name, worker, rules.steps(&mut ctx), sandbox))
            })
            .collect()
    }

    fn builder(&self, name: String, worker: &str, steps: Vec<Step>, sandbox: bool) -> BuilderSpec {
        let mut properties = PropertyMap::new();
        properties.insert("nightly".to_string(), self.target.is_nightly().to_string());

        BuilderSpec {
            build_dir: name.clone(),
            name,
            worker: worker.to_string(),
            workdir: self.target.name.clone(),
            steps,
            category: if sandbox {
                Category::Sandbox
            } else {
                Category::Builds
            },
            properties,
        }
    }

    /// Triggerable scheduler name for one cell, if this target has one.
    pub fn triggerable(&self, combination: &Combination, version: &str) -> Option<String> {
        let target = self.target;
        if target.is_nightly() || !target.has_rules() {
            return None;
        }
        self.manager.worker_for(version)?;

        target
            .branches
            .iter()
            .any(|branch| {
                target
                    .builder_name(combination, version, Some(branch), false)
                    .is_some()
            })
            .then(|| trigger_name(&target.name, combination, version))
    }
}
