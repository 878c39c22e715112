//! Sequential execution of the stages of a build

use super::context::BuildContext;
use crate::stages::stage::run_stage;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wharf_errors::Error;
use wharf_events::{AppEvent, BuildEvent, EventEmitter};
use wharf_types::{BuildOptions, BuildResult, Definition, Status};

/// Runs a build definition stage by stage
#[derive(Debug, Clone)]
pub struct Builder {
    context: BuildContext,
    definition: Definition,
    options: BuildOptions,
}

impl Builder {
    /// Create new builder
    #[must_use]
    pub fn new(context: BuildContext, definition: Definition) -> Self {
        Self {
            context,
            definition,
            options: BuildOptions::default(),
        }
    }

    /// Set build options
    #[must_use]
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the selected stages in declaration order
    ///
    /// Stops at the first stage that does not succeed; later stages are not
    /// part of the result. Selecting no stage is not an error and yields
    /// `Status::None`. Cancelling `token` cancels all running steps.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid, e.g. a stage contains
    /// two steps with the same name. Step failures are part of the result.
    pub async fn build(&self, token: &CancellationToken) -> Result<BuildResult, Error> {
        let start = Instant::now();
        self.definition.validate()?;

        let stages = self.definition.filtered_stages(&self.options);
        let mut result = BuildResult {
            status: Status::None,
            options: self.options.clone(),
            stages: Vec::with_capacity(stages.len()),
            duration: start.elapsed(),
        };
        if stages.is_empty() {
            info!(filter = %self.options.stage_filter, "no stage selected, nothing to run");
            self.context
                .emit_build_completed(result.status, 0, result.duration);
            return Ok(result);
        }

        self.context.emit(AppEvent::Build(BuildEvent::BuildStarted {
            stages: stages.iter().map(|stage| stage.name.clone()).collect(),
        }));

        result.status = Status::Success;
        for stage in stages {
            if token.is_cancelled() {
                result.status = Status::Cancelled;
                break;
            }

            let stage_result = run_stage(&self.context, stage, token).await;
            let status = stage_result.status;
            result.stages.push(stage_result);
            if status != Status::Success {
                result.status = status;
                break;
            }
        }

        result.duration = start.elapsed();
        info!(status = %result.status, stages = result.stages.len(), "build finished");
        self.context
            .emit_build_completed(result.status, result.stages.len(), result.duration);
        Ok(result)
    }
}
