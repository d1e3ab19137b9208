//! Pipeline runner - drives a builder's steps against an execution engine.

use batter_config::Properties;
use batter_core::engine::BuilderSpec;
use batter_core::executor::{PropertyMap, StepExecutor, StepOutcome, StepResult, TriggerInvoker};
use batter_core::step::Step;
use batter_core::{Error, ResourceId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::conditional::ConditionalTrigger;

/// State of a step during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Succeeded,
    Warnings,
    Failed { message: String },
    Skipped { reason: String },
}

impl StepState {
    pub fn is_success(&self) -> bool {
        matches!(self, StepState::Succeeded | StepState::Warnings)
    }
}

/// Event emitted during pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    StepStarted { index: usize, step: String },
    StepCompleted { index: usize, step: String, success: bool },
    PipelineCompleted { success: bool },
}

/// Result of a pipeline execution.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: ResourceId,
    pub builder: String,
    pub success: bool,
    /// Step names and final states, in pipeline order.
    pub step_states: Vec<(String, StepState)>,
    /// Properties at the end of the run.
    pub properties: PropertyMap,
}

/// Runs builders' steps in order, halting on the first failure.
pub struct PipelineRunner {
    executor: Arc<dyn StepExecutor>,
    triggers: Arc<dyn TriggerInvoker>,
}

impl PipelineRunner {
    pub fn new(executor: Arc<dyn StepExecutor>, triggers: Arc<dyn TriggerInvoker>) -> Self {
        Self { executor, triggers }
    }

    /// Execute a builder's pipeline, returning a channel of events and a
    /// handle to get the final result.
    ///
    /// `properties` are layered over the builder's default properties; an
    /// upstream trigger passes `nightly`, `upload_path` and workdirs here.
    pub fn execute(
        &self,
        builder: &BuilderSpec,
        properties: PropertyMap,
    ) -> (
        mpsc::Receiver<PipelineEvent>,
        tokio::task::JoinHandle<PipelineResult>,
    ) {
        let (tx, rx) = mpsc::channel(100);
        let executor = self.executor.clone();
        let triggers = self.triggers.clone();
        let builder = builder.clone();

        let mut props = Properties::from_map(builder.properties.clone());
        props.extend(properties);

        let handle = tokio::spawn(async move {
            Self::execute_inner(executor, triggers, builder, props, tx).await
        });

        (rx, handle)
    }

    async fn execute_inner(
        executor: Arc<dyn StepExecutor>,
        triggers: Arc<dyn TriggerInvoker>,
        builder: BuilderSpec,
        mut props: Properties,
        tx: mpsc::Sender<PipelineEvent>,
    ) -> PipelineResult {
        let run_id = ResourceId::new();
        let mut step_states: Vec<(String, StepState)> = builder
            .steps
            .iter()
            .map(|s| (s.name().to_string(), StepState::Pending))
            .collect();

        info!(builder = %builder.name, run = %run_id, steps = builder.steps.len(), "Starting pipeline");

        let mut failed: Option<String> = None;

        for (index, step) in builder.steps.iter().enumerate() {
            let name = step.name().to_string();

            if let Some(failed_step) = &failed {
                step_states[index].1 = StepState::Skipped {
                    reason: format!("step '{}' failed", failed_step),
                };
                continue;
            }

            let _ = tx
                .send(PipelineEvent::StepStarted {
                    index,
                    step: name.clone(),
                })
                .await;

            let state = match step {
                Step::Trigger(trigger) => {
                    match ConditionalTrigger::new(trigger)
                        .start(run_id, &props, triggers.as_ref())
                        .await
                    {
                        Ok(StepResult::Warnings) => StepState::Warnings,
                        Ok(_) => StepState::Succeeded,
                        Err(e) => StepState::Failed {
                            message: e.to_string(),
                        },
                    }
                }
                _ => Self::execute_step(&executor, &builder.name, step, &mut props).await,
            };

            let success = state.is_success();
            if success {
                info!(builder = %builder.name, step = %name, "Step completed");
            } else {
                if let StepState::Failed { message } = &state {
                    let err = Error::StepFailed {
                        step: name.clone(),
                        message: message.clone(),
                    };
                    error!(builder = %builder.name, error = %err, "Step failed");
                }
                failed = Some(name.clone());
            }

            step_states[index].1 = state;
            let _ = tx
                .send(PipelineEvent::StepCompleted {
                    index,
                    step: name,
                    success,
                })
                .await;
        }

        let success = failed.is_none();
        let _ = tx.send(PipelineEvent::PipelineCompleted { success }).await;

        PipelineResult {
            run_id,
            builder: builder.name,
            success,
            step_states,
            properties: props.as_map().clone(),
        }
    }

    /// Execute a single engine step, merging the properties it reports.
    async fn execute_step(
        executor: &Arc<dyn StepExecutor>,
        builder: &str,
        step: &Step,
        props: &mut Properties,
    ) -> StepState {
        let nightly = props.get_bool("nightly").unwrap_or(false);

        let command = match step {
            Step::Upload(upload) => Some(vec![
                props.render(&upload.source()),
                props.render(&upload.destination(props.get("upload_path"))),
            ]),
            _ => step.command(nightly).map(|c| props.render_vec(&c)),
        };

        let outcome = executor
            .execute(builder, step, command, props.as_map())
            .await
            .unwrap_or_else(|e| StepOutcome::failure(e.to_string()));

        props.extend(outcome.properties);

        let flunk_on_warnings = matches!(
            step,
            Step::Test {
                flunk_on_warnings: true,
                ..
            }
        );

        match outcome.result {
            StepResult::Success => StepState::Succeeded,
            StepResult::Warnings if flunk_on_warnings => StepState::Failed {
                message: outcome
                    .message
                    .unwrap_or_else(|| "warnings reported".to_string()),
            },
            StepResult::Warnings => StepState::Warnings,
            StepResult::Failure => StepState::Failed {
                message: outcome.message.unwrap_or_else(|| "step failed".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use batter_core::Result;
    use batter_core::engine::Category;
    use batter_core::executor::TriggerRequest;
    use batter_core::step::{DistKind, PythonDist, TriggerStep, Upload};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Records every call and reports a fixed result per step name.
    #[derive(Default)]
    struct MockExecutor {
        results: BTreeMap<&'static str, StepResult>,
        unreachable: Option<&'static str>,
        calls: Mutex<Vec<(String, Option<Vec<String>>)>>,
    }

    impl MockExecutor {
        fn with_result(mut self, step: &'static str, result: StepResult) -> Self {
            self.results.insert(step, result);
            self
        }

        fn with_unreachable(mut self, step: &'static str) -> Self {
            self.unreachable = Some(step);
            self
        }
    }

    #[async_trait]
    impl StepExecutor for MockExecutor {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn execute(
            &self,
            _builder: &str,
            step: &Step,
            command: Option<Vec<String>>,
            _properties: &PropertyMap,
        ) -> Result<StepOutcome> {
            self.calls
                .lock()
                .unwrap()
                .push((step.name().to_string(), command));

            if self.unreachable == Some(step.name()) {
                return Err(Error::Engine("worker went away".to_string()));
            }

            let result = self
                .results
                .get(step.name())
                .copied()
                .unwrap_or(StepResult::Success);

            let mut outcome = StepOutcome {
                result,
                message: None,
                properties: PropertyMap::new(),
            };
            match step {
                Step::SetProperty { property, .. } => {
                    outcome = outcome.with_property(property.clone(), "/builds/core_py2.6/core");
                }
                Step::PythonDist(dist) if dist.kind == DistKind::Egg => {
                    outcome = outcome.with_property("egg_filename", "core-1.0-py2.6.egg");
                }
                _ => {}
            }
            Ok(outcome)
        }
    }

    #[derive(Default)]
    struct MockInvoker {
        requests: Mutex<Vec<TriggerRequest>>,
    }

    #[async_trait]
    impl TriggerInvoker for MockInvoker {
        async fn trigger(&self, request: TriggerRequest) -> Result<StepResult> {
            self.requests.lock().unwrap().push(request);
            Ok(StepResult::Success)
        }
    }

    fn builder(steps: Vec<Step>) -> BuilderSpec {
        let mut properties = PropertyMap::new();
        properties.insert("nightly".to_string(), "false".to_string());

        BuilderSpec {
            name: "core_py2.6".to_string(),
            worker: "linux-py26".to_string(),
            build_dir: "core_py2.6".to_string(),
            workdir: "core".to_string(),
            steps,
            category: Category::Builds,
            properties,
        }
    }

    fn announce() -> Step {
        Step::SetProperty {
            property: "core_workdir".to_string(),
            command: vec!["pwd".to_string()],
            workdir: "core".to_string(),
        }
    }

    fn test_step(flunk_on_warnings: bool) -> Step {
        Step::Test {
            command: vec!["nosetests".to_string()],
            workdir: "core".to_string(),
            env: BTreeMap::new(),
            flunk_on_warnings,
        }
    }

    fn egg() -> Step {
        Step::PythonDist(PythonDist {
            kind: DistKind::Egg,
            workdir: "core".to_string(),
            use_egg_info: true,
            env: BTreeMap::new(),
        })
    }

    fn upload() -> Step {
        Step::Upload(Upload {
            filename_property: "egg_filename".to_string(),
            default_path: "/var/www/eggs".to_string(),
            workdir: "core".to_string(),
        })
    }

    fn trigger() -> Step {
        let mut set_properties = BTreeMap::new();
        set_properties.insert("core_workdir".to_string(), "${core_workdir}".to_string());
        set_properties.insert("nightly".to_string(), "${nightly:-false}".to_string());

        Step::Trigger(TriggerStep {
            scheduler_names: vec!["triggered_plugin_core_trunk_py2.6".to_string()],
            wait_for_triggers: false,
            nightly_default: false,
            set_properties,
        })
    }

    fn runner(executor: Arc<MockExecutor>, invoker: Arc<MockInvoker>) -> PipelineRunner {
        PipelineRunner::new(executor, invoker)
    }

    #[tokio::test]
    async fn test_successful_pipeline_threads_properties() {
        let executor = Arc::new(MockExecutor::default());
        let invoker = Arc::new(MockInvoker::default());

        let (mut rx, handle) = runner(executor.clone(), invoker.clone()).execute(
            &builder(vec![announce(), egg(), upload(), trigger()]),
            PropertyMap::new(),
        );
        let result = handle.await.unwrap();

        assert!(result.success);
        assert!(result.step_states.iter().all(|(_, s)| s.is_success()));
        assert_eq!(result.properties["egg_filename"], "core-1.0-py2.6.egg");

        let calls = executor.calls.lock().unwrap();
        assert_eq!(
            calls[1].1.as_deref(),
            Some(
                &[
                    "python".to_string(),
                    "setup.py".to_string(),
                    "egg_info".to_string(),
                    "-Dr".to_string(),
                    "bdist_egg".to_string(),
                ][..]
            )
        );
        assert_eq!(
            calls[2].1.as_deref(),
            Some(
                &[
                    "dist/core-1.0-py2.6.egg".to_string(),
                    "/var/www/eggs/core-1.0-py2.6.egg".to_string(),
                ][..]
            )
        );

        let requests = invoker.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].properties["core_workdir"], "/builds/core_py2.6/core");
        assert!(!requests[0].wait_for_finish);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events.last(),
            Some(&PipelineEvent::PipelineCompleted { success: true })
        );
    }

    #[tokio::test]
    async fn test_upstream_nightly_changes_tags_and_wait() {
        let executor = Arc::new(MockExecutor::default());
        let invoker = Arc::new(MockInvoker::default());

        let mut upstream = PropertyMap::new();
        upstream.insert("nightly".to_string(), "True".to_string());
        upstream.insert("upload_path".to_string(), "/srv/nightly".to_string());

        let (_rx, handle) = runner(executor.clone(), invoker.clone()).execute(
            &builder(vec![announce(), egg(), upload(), trigger()]),
            upstream,
        );
        let result = handle.await.unwrap();
        assert!(result.success);

        let calls = executor.calls.lock().unwrap();
        assert!(calls[1].1.as_ref().unwrap().contains(&"-dR".to_string()));
        assert_eq!(
            calls[2].1.as_ref().unwrap()[1],
            "/srv/nightly/core-1.0-py2.6.egg"
        );

        let requests = invoker.requests.lock().unwrap();
        assert!(requests[0].wait_for_finish);
        assert_eq!(requests[0].properties["nightly"], "True");
    }

    #[tokio::test]
    async fn test_failure_halts_remaining_steps() {
        let executor =
            Arc::new(MockExecutor::default().with_result("test", StepResult::Failure));
        let invoker = Arc::new(MockInvoker::default());

        let (_rx, handle) = runner(executor.clone(), invoker.clone()).execute(
            &builder(vec![announce(), test_step(false), egg(), trigger()]),
            PropertyMap::new(),
        );
        let result = handle.await.unwrap();

        assert!(!result.success);
        assert!(matches!(result.step_states[1].1, StepState::Failed { .. }));
        assert!(matches!(result.step_states[2].1, StepState::Skipped { .. }));
        assert!(matches!(result.step_states[3].1, StepState::Skipped { .. }));
        assert_eq!(executor.calls.lock().unwrap().len(), 2);
        assert!(invoker.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_warnings_flunk_tests_when_configured() {
        let executor =
            Arc::new(MockExecutor::default().with_result("test", StepResult::Warnings));
        let invoker = Arc::new(MockInvoker::default());

        let (_rx, handle) = runner(executor.clone(), invoker.clone())
            .execute(&builder(vec![test_step(true)]), PropertyMap::new());
        assert!(!handle.await.unwrap().success);

        let (_rx, handle) = runner(executor, invoker)
            .execute(&builder(vec![test_step(false)]), PropertyMap::new());
        let result = handle.await.unwrap();
        assert!(result.success);
        assert_eq!(result.step_states[0].1, StepState::Warnings);
    }

    #[tokio::test]
    async fn test_engine_error_fails_step() {
        let executor = Arc::new(MockExecutor::default().with_unreachable("test"));
        let invoker = Arc::new(MockInvoker::default());

        let (_rx, handle) = runner(executor, invoker)
            .execute(&builder(vec![test_step(false), egg()]), PropertyMap::new());
        let result = handle.await.unwrap();

        assert!(!result.success);
        match &result.step_states[0].1 {
            StepState::Failed { message } => assert!(message.contains("worker went away")),
            other => panic!("unexpected state {:?}", other),
        }
        assert!(matches!(result.step_states[1].1, StepState::Skipped { .. }));
    }
}
