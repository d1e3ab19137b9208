//! Dry-run of a builder's pipeline.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use batter_core::executor::{
    PropertyMap, StepExecutor, StepOutcome, StepResult, TriggerInvoker, TriggerRequest,
};
use batter_core::step::Step;
use batter_scheduler::{PipelineEvent, PipelineRunner, StepState};
use std::sync::Arc;

/// Prints each step instead of running it.
///
/// Property steps report a placeholder value and dist builds a placeholder
/// file name, so later steps render the way they would in a real build.
struct DryRunExecutor;

#[async_trait]
impl StepExecutor for DryRunExecutor {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn execute(
        &self,
        builder: &str,
        step: &Step,
        command: Option<Vec<String>>,
        _properties: &PropertyMap,
    ) -> batter_core::Result<StepOutcome> {
        let mut outcome = StepOutcome::success();

        match step {
            Step::Checkout(checkout) => {
                println!(
                    "  {} checkout {} into {}",
                    checkout.vcs, checkout.url, checkout.workdir
                );
            }
            Step::Upload(_) => {
                if let Some([source, destination]) = command.as_deref() {
                    println!("  upload {} -> {}", source, destination);
                }
            }
            Step::SetProperty {
                property, workdir, ..
            } => {
                println!("  set {} from `pwd` in {}", property, workdir);
                outcome =
                    outcome.with_property(property.clone(), format!("<{}>/{}", builder, workdir));
            }
            Step::PythonDist(dist) => {
                println!("  $ {}", command.unwrap_or_default().join(" "));
                outcome = outcome.with_property(
                    dist.kind.filename_property(),
                    format!("<{}>", dist.kind.dist_type()),
                );
            }
            _ => {
                println!("  $ {}", command.unwrap_or_default().join(" "));
            }
        }

        Ok(outcome)
    }
}

/// Prints trigger requests and reports them as submitted.
struct DryRunTriggers;

#[async_trait]
impl TriggerInvoker for DryRunTriggers {
    async fn trigger(&self, request: TriggerRequest) -> batter_core::Result<StepResult> {
        println!(
            "  trigger {} (wait: {})",
            request.scheduler_names.join(", "),
            request.wait_for_finish
        );
        for (name, value) in &request.properties {
            println!("    {} = {}", name, value);
        }
        Ok(StepResult::Success)
    }
}

fn parse_properties(raw: &[String]) -> Result<PropertyMap> {
    raw.iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected name=value, got '{}'", pair))?;
            Ok((name.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Walk one builder's steps with the dry-run engine.
pub async fn run_dry(
    manifest_path: &str,
    workers_path: &str,
    builder_name: &str,
    properties: &[String],
) -> Result<()> {
    let manager = super::load(manifest_path, workers_path)?;
    let properties = parse_properties(properties)?;

    let builders = manager.builders();
    let Some(builder) = builders.iter().find(|b| b.name == builder_name) else {
        bail!("Unknown builder: {}", builder_name);
    };

    println!("Builder: {} (worker {})", builder.name, builder.worker);

    let runner = PipelineRunner::new(Arc::new(DryRunExecutor), Arc::new(DryRunTriggers));
    let (mut rx, result_handle) = runner.execute(builder, properties);

    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::StepStarted { index, step } => {
                println!("▶ [{}] {}", index + 1, step);
            }
            PipelineEvent::StepCompleted { .. } => {}
            PipelineEvent::PipelineCompleted { success } => {
                if success {
                    println!("--- Pipeline completed successfully ---");
                } else {
                    println!("--- Pipeline failed ---");
                }
            }
        }
    }

    let result = result_handle
        .await
        .context("Pipeline execution task failed")?;

    for (step, state) in &result.step_states {
        if let StepState::Failed { message } = state {
            println!("  {} - failed: {}", step, message);
        }
    }

    if result.success {
        Ok(())
    } else {
        bail!("Pipeline failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_properties() {
        let props = parse_properties(&[
            "nightly=True".to_string(),
            "upload_path=/srv/a=b".to_string(),
        ])
        .unwrap();
        assert_eq!(props["nightly"], "True");
        assert_eq!(props["upload_path"], "/srv/a=b");
    }

    #[test]
    fn test_parse_properties_rejects_bare_names() {
        assert!(parse_properties(&["nightly".to_string()]).is_err());
    }
}
