//! The per-builder step pipeline.
//!
//! Steps are contributed by phases in a fixed order:
//! checkout, environment, announce-workdir, test, build, upload and
//! downstream triggers. A target's [`BuildRulesConfig`] picks what each
//! configurable phase contributes.

use batter_core::naming::workdir_property;
use batter_core::rules::{
    BuildRule, BuildRulesConfig, CheckoutRule, EnvironmentRule, TestRule, UploadRule,
};
use batter_core::step::{DistKind, PythonDist, Step, TriggerStep, Upload};
use batter_core::{Branch, BuildTarget, Combination};
use std::collections::BTreeMap;
use tracing::{debug, trace};

use crate::manager::BuildManager;

/// Everything a phase needs to know about the cell being built.
#[derive(Debug, Clone)]
pub struct CellContext<'a> {
    pub manager: &'a BuildManager,
    pub target: &'a BuildTarget,
    pub branch: &'a Branch,
    pub combination: &'a Combination,
    pub version: &'a str,
    pub workdir: String,
    /// Environment for command steps, filled in by earlier phases.
    pub env: BTreeMap<String, String>,
    /// Dists produced by the build phase, in build order.
    pub built: Vec<DistKind>,
}

impl<'a> CellContext<'a> {
    pub fn new(
        manager: &'a BuildManager,
        target: &'a BuildTarget,
        branch: &'a Branch,
        combination: &'a Combination,
        version: &'a str,
        workdir: &str,
    ) -> Self {
        Self {
            manager,
            target,
            branch,
            combination,
            version,
            workdir: workdir.to_string(),
            env: BTreeMap::new(),
            built: Vec::new(),
        }
    }

    /// Interpreter executable for the cell's version.
    pub fn python(&self) -> String {
        format!("python{}", self.version)
    }
}

/// A stage of the pipeline.
pub trait Phase {
    fn name(&self) -> &'static str;

    /// Append this phase's steps.
    fn add_steps(&self, ctx: &mut CellContext<'_>, steps: &mut Vec<Step>);
}

impl Phase for EnvironmentRule {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn add_steps(&self, ctx: &mut CellContext<'_>, steps: &mut Vec<Step>) {
        let EnvironmentRule::Virtualenv {
            egg_deps,
            find_links,
            upload_url,
        } = self
        else {
            return;
        };

        let python = ctx.python();
        steps.push(Step::Virtualenv {
            python: python.clone(),
        });

        ctx.env.insert(
            "PATH".to_string(),
            "bin:../build/bin:/bin:/usr/bin".to_string(),
        );
        ctx.env.insert(
            "PYTHONPATH".to_string(),
            format!(
                "lib/{py}:../build/lib/{py}:lib/{py}/site-packages:../build/lib/{py}/site-packages",
                py = python
            ),
        );

        if !egg_deps.is_empty() {
            steps.push(Step::EasyInstall {
                packages: egg_deps.clone(),
                find_links: upload_url.iter().chain(find_links).cloned().collect(),
                env: ctx.env.clone(),
            });
        }
    }
}

impl Phase for CheckoutRule {
    fn name(&self) -> &'static str {
        "checkout"
    }

    fn add_steps(&self, ctx: &mut CellContext<'_>, steps: &mut Vec<Step>) {
        if matches!(self, CheckoutRule::Branch) {
            steps.push(ctx.branch.checkout_step(ctx.target, &ctx.workdir));
        }
    }
}

/// Records the absolute workdir as `<target>_workdir` for triggered builds.
pub struct AnnounceWorkdir;

impl Phase for AnnounceWorkdir {
    fn name(&self) -> &'static str {
        "announce-workdir"
    }

    fn add_steps(&self, ctx: &mut CellContext<'_>, steps: &mut Vec<Step>) {
        steps.push(Step::SetProperty {
            property: workdir_property(&ctx.target.name),
            command: vec!["pwd".to_string()],
            workdir: ctx.workdir.clone(),
        });
    }
}

impl Phase for TestRule {
    fn name(&self) -> &'static str {
        "test"
    }

    fn add_steps(&self, ctx: &mut CellContext<'_>, steps: &mut Vec<Step>) {
        if let TestRule::Command {
            command,
            flunk_on_warnings,
        } = self
        {
            steps.push(Step::Test {
                command: command.clone(),
                workdir: ctx.workdir.clone(),
                env: ctx.env.clone(),
                flunk_on_warnings: *flunk_on_warnings,
            });
        }
    }
}

impl Phase for BuildRule {
    fn name(&self) -> &'static str {
        "build"
    }

    fn add_steps(&self, ctx: &mut CellContext<'_>, steps: &mut Vec<Step>) {
        let BuildRule::PythonDist { build_eggs } = self else {
            return;
        };

        let mut dist = |kind: DistKind, use_egg_info: bool| {
            ctx.built.push(kind);
            Step::PythonDist(PythonDist {
                kind,
                workdir: ctx.workdir.clone(),
                use_egg_info,
                env: ctx.env.clone(),
            })
        };

        steps.push(dist(DistKind::Sdist, *build_eggs));
        if *build_eggs {
            steps.push(dist(DistKind::Egg, true));
        }
    }
}

impl Phase for UploadRule {
    fn name(&self) -> &'static str {
        "upload"
    }

    fn add_steps(&self, ctx: &mut CellContext<'_>, steps: &mut Vec<Step>) {
        let UploadRule::Dist { default_path } = self else {
            return;
        };

        for kind in &ctx.built {
            steps.push(Step::Upload(Upload {
                filename_property: kind.filename_property().to_string(),
                default_path: default_path.clone(),
                workdir: ctx.workdir.clone(),
            }));
        }
    }
}

/// Invokes the triggerable scheduler of every downstream target for the
/// same combination and version.
pub struct DownstreamTriggers;

impl DownstreamTriggers {
    fn set_properties(target: &BuildTarget) -> BTreeMap<String, String> {
        let workdir_key = workdir_property(&target.name);

        let mut properties = BTreeMap::new();
        properties.insert(workdir_key.clone(), format!("${{{}}}", workdir_key));
        properties.insert(
            "nightly".to_string(),
            format!("${{nightly:-{}}}", target.is_nightly()),
        );
        properties.insert("upload_path".to_string(), "${upload_path:-}".to_string());
        properties.extend(
            target
                .trigger_properties
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        properties
    }
}

impl Phase for DownstreamTriggers {
    fn name(&self) -> &'static str {
        "trigger"
    }

    fn add_steps(&self, ctx: &mut CellContext<'_>, steps: &mut Vec<Step>) {
        for trigger in &ctx.target.triggers {
            let Some(downstream) = ctx.manager.target(trigger) else {
                continue;
            };

            let Some(scheduler) = ctx
                .manager
                .plan(downstream)
                .triggerable(ctx.combination, ctx.version)
            else {
                debug!(
                    target = %ctx.target.name,
                    trigger = %trigger,
                    combination = %ctx.combination,
                    version = %ctx.version,
                    "Downstream target has no triggerable for cell"
                );
                continue;
            };

            steps.push(Step::Trigger(TriggerStep {
                scheduler_names: vec![scheduler],
                wait_for_triggers: ctx.target.wait_for_triggers,
                nightly_default: ctx.target.is_nightly(),
                set_properties: Self::set_properties(ctx.target),
            }));
        }
    }
}

/// The step pipeline of a target's builders.
pub struct BuildRules<'a> {
    config: &'a BuildRulesConfig,
}

impl<'a> BuildRules<'a> {
    pub fn new(config: &'a BuildRulesConfig) -> Self {
        Self { config }
    }

    fn phases(&self) -> [&dyn Phase; 7] {
        [
            &self.config.checkout,
            &self.config.environment,
            &AnnounceWorkdir,
            &self.config.test,
            &self.config.build,
            &self.config.upload,
            &DownstreamTriggers,
        ]
    }

    /// Steps of one cell's builder, in phase order.
    pub fn steps(&self, ctx: &mut CellContext<'_>) -> Vec<Step> {
        let mut steps = Vec::new();
        for phase in self.phases() {
            let before = steps.len();
            phase.add_steps(ctx, &mut steps);
            if steps.len() > before {
                trace!(phase = phase.name(), added = steps.len() - before, "Added steps");
            }
        }
        steps
    }
}
