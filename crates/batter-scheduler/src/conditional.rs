//! Trigger steps whose wait flag is resolved when the step starts.

use batter_config::Properties;
use batter_core::executor::{StepResult, TriggerInvoker, TriggerRequest};
use batter_core::step::TriggerStep;
use batter_core::{Error, ResourceId, Result};
use tracing::{error, info};

/// Whether a trigger blocks until the triggered builds finish.
///
/// A nightly run always waits so that a nightly chain finishes as a unit.
pub fn resolve_wait(static_default: bool, runtime_nightly: bool) -> bool {
    static_default || runtime_nightly
}

/// A trigger step bound to the configuration it was derived from.
///
/// The step is never modified; every invocation resolves its own wait flag
/// from the running build's properties.
#[derive(Debug, Clone, Copy)]
pub struct ConditionalTrigger<'a> {
    step: &'a TriggerStep,
}

impl<'a> ConditionalTrigger<'a> {
    pub fn new(step: &'a TriggerStep) -> Self {
        Self { step }
    }

    /// The statically configured wait flag.
    pub fn wait_for_finish(&self) -> bool {
        self.step.wait_for_triggers
    }

    /// Whether the running build is nightly: the `nightly` property when it
    /// is set, otherwise the configured default.
    pub fn nightly(&self, properties: &Properties) -> bool {
        properties
            .get_bool("nightly")
            .unwrap_or(self.step.nightly_default)
    }

    pub fn resolved_wait(&self, properties: &Properties) -> bool {
        resolve_wait(self.wait_for_finish(), self.nightly(properties))
    }

    /// The request this trigger issues for a build with `properties`.
    pub fn request(&self, parent_run: ResourceId, properties: &Properties) -> TriggerRequest {
        TriggerRequest {
            parent_run,
            scheduler_names: self.step.scheduler_names.clone(),
            wait_for_finish: self.resolved_wait(properties),
            properties: properties.render_map(&self.step.set_properties),
        }
    }

    /// Start the triggered builds. Any failure is fatal to the issuing build.
    pub async fn start(
        &self,
        parent_run: ResourceId,
        properties: &Properties,
        invoker: &dyn TriggerInvoker,
    ) -> Result<StepResult> {
        let request = self.request(parent_run, properties);
        let schedulers = request.scheduler_names.clone();

        info!(
            schedulers = ?schedulers,
            wait = request.wait_for_finish,
            "Triggering downstream builds"
        );

        match invoker.trigger(request).await {
            Ok(StepResult::Failure) => {
                error!(schedulers = ?schedulers, "Triggered builds failed");
                Err(Error::TriggerFailed {
                    schedulers,
                    message: "triggered builds failed".to_string(),
                })
            }
            Ok(result) => Ok(result),
            Err(e) => {
                error!(schedulers = ?schedulers, error = %e, "Trigger failed");
                Err(Error::TriggerFailed {
                    schedulers,
                    message: e.to_string(),
                })
            }
        }
    }
}
