//! Parallel execution of the steps of one stage

use super::step::run_step;
use crate::core::context::BuildContext;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wharf_errors::Error;
use wharf_events::EventEmitter;
use wharf_types::{Stage, StageResult, Status, StepResult};

/// Run every step of `stage` concurrently
///
/// The first step that neither succeeds nor is cancelled cancels all of its
/// siblings. Cancelling `token` cancels every step. Returns once all step
/// tasks have finished; step results are in completion order.
pub(crate) async fn run_stage(
    context: &BuildContext,
    stage: &Stage,
    token: &CancellationToken,
) -> StageResult {
    let start = Instant::now();
    context.emit_stage_started(&stage.name, stage.steps.len());
    info!(stage = %stage.name, steps = stage.steps.len(), "stage started");

    let stage_token = token.child_token();
    let mut tasks = JoinSet::new();
    let mut spawned = HashMap::with_capacity(stage.steps.len());

    for step in &stage.steps {
        let handle = tasks.spawn(run_step(
            context.clone(),
            stage.name.clone(),
            step.clone(),
            stage_token.child_token(),
        ));
        spawned.insert(
            handle.id(),
            (step.name.clone(), step.step_type.type_name()),
        );
    }

    let mut failed = false;
    let mut steps = Vec::with_capacity(stage.steps.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        let result = match joined {
            Ok((_, result)) => result,
            Err(join_err) => {
                let (name, step_type) = spawned
                    .remove(&join_err.id())
                    .unwrap_or_else(|| (String::from("<unknown>"), "unknown"));
                warn!(stage = %stage.name, step = %name, error = %join_err, "step task died");
                context.emit_error(format!(
                    "step {name} of stage {} died: {join_err}",
                    stage.name
                ));
                let result = StepResult::from_outcome(
                    name,
                    step_type,
                    Err(Error::internal(format!("step task failed: {join_err}"))),
                    Duration::ZERO,
                );
                context.emit_step_completed(&stage.name, &result);
                result
            }
        };

        if !failed && !matches!(result.status, Status::Success | Status::Cancelled) {
            failed = true;
            info!(stage = %stage.name, step = %result.name, "step failed, cancelling siblings");
            stage_token.cancel();
        }
        steps.push(result);
    }

    let status = if failed {
        Status::Failed
    } else if steps.iter().any(|step| step.status == Status::Cancelled) {
        Status::Cancelled
    } else {
        Status::Success
    };

    let result = StageResult {
        name: stage.name.clone(),
        status,
        steps,
        duration: start.elapsed(),
    };
    context.emit_stage_completed(&result);
    info!(stage = %stage.name, status = %result.status, "stage finished");
    result
}
