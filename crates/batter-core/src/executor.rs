//! Traits implemented by the execution engine.
//!
//! batter never runs a step itself. The pipeline runner hands each step to a
//! [`StepExecutor`] and each trigger to a [`TriggerInvoker`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::step::Step;
use crate::{ResourceId, Result};

/// Build properties, keyed by name.
pub type PropertyMap = BTreeMap<String, String>;

/// Result reported for a finished step or build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepResult {
    Success,
    Warnings,
    Failure,
}

impl StepResult {
    pub fn is_failure(self) -> bool {
        matches!(self, StepResult::Failure)
    }
}

/// What an executed step reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub result: StepResult,
    pub message: Option<String>,
    /// Properties set by the step (e.g. the name of a built file).
    pub properties: PropertyMap,
}

impl StepOutcome {
    pub fn success() -> Self {
        Self {
            result: StepResult::Success,
            message: None,
            properties: PropertyMap::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            result: StepResult::Failure,
            message: Some(message.into()),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// Trait for engines that run individual steps.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Name of this executor.
    fn name(&self) -> &'static str;

    /// Run one step of `builder`.
    ///
    /// `command` is the rendered command line for command steps.
    /// `properties` are the build's properties at the time the step starts.
    async fn execute(
        &self,
        builder: &str,
        step: &Step,
        command: Option<Vec<String>>,
        properties: &PropertyMap,
    ) -> Result<StepOutcome>;
}

/// A request to start the builds behind one or more triggerable schedulers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub parent_run: ResourceId,
    pub scheduler_names: Vec<String>,
    /// Block until the triggered builds finish.
    pub wait_for_finish: bool,
    pub properties: PropertyMap,
}

/// Trait for engines that can invoke triggerable schedulers.
#[async_trait]
pub trait TriggerInvoker: Send + Sync {
    /// Start the triggered builds.
    ///
    /// When `wait_for_finish` is set the result is that of the triggered
    /// builds; otherwise it reports whether submission succeeded.
    async fn trigger(&self, request: TriggerRequest) -> Result<StepResult>;
}
