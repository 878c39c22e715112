//! Lifecycle of the workload behind a single step
//!
//! A step owns exactly one workload. It is created, held in its init
//! container until the workspace has been transferred, released, followed
//! until the step container exits, and deleted again no matter how the step
//! ended.

use crate::core::context::BuildContext;
use crate::orchestrator::{ContainerState, WorkloadEvent, WorkloadStatus};
use crate::utils::archive::workspace_tar_stream;
use crate::workload::{continue_command, transfer_command};
use futures::StreamExt;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wharf_config::constants::{INIT_CONTAINER_NAME, STEP_CONTAINER_NAME};
use wharf_errors::{Error, ExecutionError, OrchestratorError, WorkloadPhase};
use wharf_events::{EventEmitter, StepPhase};
use wharf_types::{Step, StepResult};

/// Waiting reasons after which a container will never start on its own
const FATAL_WAITING_REASONS: &[&str] = &[
    "CreateContainerConfigError",
    "CreateContainerError",
    "ErrImagePull",
    "ErrImageNeverPull",
    "InvalidImageName",
];

/// Run one step to completion and classify its outcome
pub(crate) async fn run_step(
    context: BuildContext,
    stage: String,
    step: Step,
    token: CancellationToken,
) -> StepResult {
    let start = Instant::now();
    let step_type = step.step_type.type_name();
    context.emit_step_started(&stage, &step.name, step_type);

    let outcome = execute(&context, &stage, &step, &token).await;
    match &outcome {
        Ok(()) => info!(stage = %stage, step = %step.name, "step succeeded"),
        Err(err) if err.is_cancelled() => info!(stage = %stage, step = %step.name, "step cancelled"),
        Err(err) => warn!(stage = %stage, step = %step.name, error = %err, "step failed"),
    }

    let result = StepResult::from_outcome(&step.name, step_type, outcome, start.elapsed());
    context.emit_step_completed(&stage, &result);
    result
}

async fn execute(
    context: &BuildContext,
    stage: &str,
    step: &Step,
    token: &CancellationToken,
) -> Result<(), Error> {
    let spec = context.spec_builder.build(stage, step)?;

    context.emit_step_phase(stage, &step.name, StepPhase::Scheduling);
    // Creation is not raced against cancellation so the assigned name is
    // always known to the guard below.
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    let workload = context.orchestrator.create(&spec).await?;
    debug!(stage, step = %step.name, workload = %workload, "workload created");

    let guard = WorkloadGuard::new(context.clone(), workload.clone());
    let lifecycle = Lifecycle {
        context,
        stage,
        step: &step.name,
        workload: &workload,
    };
    let outcome = lifecycle.drive(token).await;
    guard.release().await;
    outcome
}

/// Race a blocking operation against cancellation of the step
async fn cancellable<T>(
    token: &CancellationToken,
    operation: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    tokio::select! {
        biased;
        () = token.cancelled() => Err(Error::Cancelled),
        result = operation => result,
    }
}

/// How the step container left its waiting state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AppStart {
    Running,
    /// Exited with code 0 before a running state was observed
    Completed,
}

struct Lifecycle<'a> {
    context: &'a BuildContext,
    stage: &'a str,
    step: &'a str,
    workload: &'a str,
}

impl Lifecycle<'_> {
    async fn drive(&self, token: &CancellationToken) -> Result<(), Error> {
        let workload = self.workload;
        let orchestrator = &self.context.orchestrator;

        cancellable(
            token,
            self.wait_for(WorkloadPhase::Init, |status| init_running(workload, status)),
        )
        .await?;
        self.phase(StepPhase::Initializing);

        cancellable(token, self.transfer()).await?;
        debug!(workload, "workspace transferred");

        cancellable(
            token,
            orchestrator.exec(
                workload,
                INIT_CONTAINER_NAME,
                WorkloadPhase::Continue,
                &continue_command(),
                None,
            ),
        )
        .await?;

        let start = cancellable(
            token,
            self.wait_for(WorkloadPhase::App, |status| app_started(workload, status)),
        )
        .await?;
        if start == AppStart::Completed {
            debug!(workload, "step container exited before it was seen running");
            return Ok(());
        }
        self.phase(StepPhase::Running);

        cancellable(token, self.follow_logs()).await?;

        cancellable(
            token,
            self.wait_for(WorkloadPhase::App, |status| app_terminated(workload, status)),
        )
        .await
    }

    fn phase(&self, phase: StepPhase) {
        self.context.emit_step_phase(self.stage, self.step, phase);
    }

    /// Watch the workload until `predicate` yields a value
    ///
    /// The predicate returns `Ok(None)` to keep waiting. A deleted workload or
    /// a watch that closes without a match is an error.
    async fn wait_for<T>(
        &self,
        phase: WorkloadPhase,
        predicate: impl Fn(&WorkloadStatus) -> Result<Option<T>, Error>,
    ) -> Result<T, Error> {
        let mut events = self.context.orchestrator.watch(self.workload, phase).await?;
        while let Some(event) = events.next().await {
            match event? {
                WorkloadEvent::Modified(status) => {
                    if let Some(value) = predicate(&status)? {
                        return Ok(value);
                    }
                }
                WorkloadEvent::Deleted => {
                    return Err(OrchestratorError::WorkloadDeleted {
                        workload: self.workload.to_string(),
                        phase,
                    }
                    .into());
                }
            }
        }
        Err(OrchestratorError::WatchClosed {
            workload: self.workload.to_string(),
            phase,
        }
        .into())
    }

    /// Pipe the workspace archive into an extracting command in the init container
    async fn transfer(&self) -> Result<(), Error> {
        let (stdin, archiver) = workspace_tar_stream(self.context.workspace.clone());
        let command = transfer_command(self.context.spec_builder.repo_mount_path());
        let exec = self
            .context
            .orchestrator
            .exec(
                self.workload,
                INIT_CONTAINER_NAME,
                WorkloadPhase::Transfer,
                &command,
                Some(stdin),
            )
            .await;

        let archived = archiver.await.map_err(|e| ExecutionError::Transfer {
            workload: self.workload.to_string(),
            message: format!("archive task failed: {e}"),
        })?;

        match (exec, archived) {
            // A broken pipe only means the exec stopped reading
            (Err(exec_err), Err(Error::Io { kind, .. }))
                if kind == std::io::ErrorKind::BrokenPipe =>
            {
                Err(exec_err)
            }
            (_, Err(archive_err)) => Err(ExecutionError::Transfer {
                workload: self.workload.to_string(),
                message: archive_err.to_string(),
            }
            .into()),
            (exec, Ok(())) => exec,
        }
    }

    async fn follow_logs(&self) -> Result<(), Error> {
        let mut lines = self
            .context
            .orchestrator
            .logs(self.workload, STEP_CONTAINER_NAME)
            .await?;
        while let Some(line) = lines.next().await {
            let line = line?;
            self.context
                .emit_step_output(self.stage, self.step, last_overwrite(&line));
        }
        Ok(())
    }
}

/// Text a terminal would show for a line that rewrites itself with `\r`
///
/// Only the text after the last carriage return is kept. A trailing `\r`,
/// as left by CRLF line endings, does not count.
fn last_overwrite(line: &str) -> &str {
    let line = line.trim_end_matches('\r');
    line.rsplit('\r').next().unwrap_or(line)
}

fn waiting_error(workload: &str, state: &ContainerState) -> Result<(), Error> {
    if let ContainerState::Waiting { reason, message } = state {
        if FATAL_WAITING_REASONS.contains(&reason.as_str()) {
            return Err(ExecutionError::Waiting {
                workload: workload.to_string(),
                reason: reason.clone(),
                message: message.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn init_running(workload: &str, status: &WorkloadStatus) -> Result<Option<()>, Error> {
    match &status.init {
        Some(ContainerState::Running) => Ok(Some(())),
        Some(ContainerState::Terminated { exit_code, .. }) => Err(ExecutionError::InitFailed {
            workload: workload.to_string(),
            exit_code: *exit_code,
        }
        .into()),
        Some(state) => waiting_error(workload, state).map(|()| None),
        None => Ok(None),
    }
}

fn app_started(workload: &str, status: &WorkloadStatus) -> Result<Option<AppStart>, Error> {
    if let Some(ContainerState::Terminated { exit_code, .. }) = &status.init {
        if *exit_code != 0 {
            return Err(ExecutionError::InitFailed {
                workload: workload.to_string(),
                exit_code: *exit_code,
            }
            .into());
        }
    }
    match &status.step {
        Some(ContainerState::Running) => Ok(Some(AppStart::Running)),
        Some(ContainerState::Terminated { exit_code: 0, .. }) => Ok(Some(AppStart::Completed)),
        Some(ContainerState::Terminated { exit_code, .. }) => Err(ExecutionError::NonZeroExit {
            workload: workload.to_string(),
            exit_code: *exit_code,
        }
        .into()),
        Some(state) => waiting_error(workload, state).map(|()| None),
        None => Ok(None),
    }
}

fn app_terminated(workload: &str, status: &WorkloadStatus) -> Result<Option<()>, Error> {
    match &status.step {
        Some(ContainerState::Terminated { exit_code: 0, .. }) => Ok(Some(())),
        Some(ContainerState::Terminated { exit_code, .. }) => Err(ExecutionError::NonZeroExit {
            workload: workload.to_string(),
            exit_code: *exit_code,
        }
        .into()),
        _ => Ok(None),
    }
}

/// Deletes the workload when the step is done with it
///
/// Deletion runs outside the step's cancellation, so a cancelled step still
/// cleans up. If the guard is dropped without `release`, e.g. because the
/// step task was aborted, deletion is spawned onto the runtime instead.
struct WorkloadGuard {
    context: BuildContext,
    workload: Option<String>,
}

impl WorkloadGuard {
    fn new(context: BuildContext, workload: String) -> Self {
        Self {
            context,
            workload: Some(workload),
        }
    }

    async fn release(mut self) {
        if let Some(workload) = self.workload.take() {
            delete_workload(&self.context, &workload).await;
        }
    }
}

impl Drop for WorkloadGuard {
    fn drop(&mut self) {
        if let Some(workload) = self.workload.take() {
            let context = self.context.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    delete_workload(&context, &workload).await;
                });
            } else {
                warn!(workload = %workload, "no runtime available, workload not deleted");
            }
        }
    }
}

/// Failures are reported but never change the step outcome
async fn delete_workload(context: &BuildContext, workload: &str) {
    match context.orchestrator.delete(workload).await {
        Ok(()) => debug!(workload, "workload deleted"),
        Err(err) => {
            warn!(workload, error = %err, "failed to delete workload");
            context.emit_warning_with_context(
                format!("failed to delete workload {workload}"),
                err.to_string(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(init: Option<ContainerState>, step: Option<ContainerState>) -> WorkloadStatus {
        WorkloadStatus { init, step }
    }

    fn terminated(exit_code: i32) -> Option<ContainerState> {
        Some(ContainerState::Terminated {
            exit_code,
            reason: String::new(),
        })
    }

    fn waiting(reason: &str) -> Option<ContainerState> {
        Some(ContainerState::Waiting {
            reason: reason.to_string(),
            message: "details".to_string(),
        })
    }

    #[test]
    fn keeps_text_after_last_carriage_return() {
        assert_eq!(last_overwrite("plain line"), "plain line");
        assert_eq!(last_overwrite("10%\r50%\r100%"), "100%");
        assert_eq!(last_overwrite("windows line\r"), "windows line");
        assert_eq!(last_overwrite("10%\r100%\r\r"), "100%");
        assert_eq!(last_overwrite(""), "");
    }

    #[test]
    fn init_waits_until_running() {
        assert_eq!(init_running("w", &status(None, None)).unwrap(), None);
        assert_eq!(
            init_running("w", &status(waiting("PodInitializing"), None)).unwrap(),
            None
        );
        assert_eq!(
            init_running("w", &status(Some(ContainerState::Running), None)).unwrap(),
            Some(())
        );
        assert!(init_running("w", &status(terminated(1), None)).is_err());
        assert!(init_running("w", &status(waiting("InvalidImageName"), None)).is_err());
    }

    #[test]
    fn app_start_accepts_early_success() {
        assert_eq!(
            app_started("w", &status(terminated(0), terminated(0))).unwrap(),
            Some(AppStart::Completed)
        );
        assert_eq!(
            app_started("w", &status(terminated(0), Some(ContainerState::Running))).unwrap(),
            Some(AppStart::Running)
        );
        assert_eq!(
            app_started("w", &status(Some(ContainerState::Running), None)).unwrap(),
            None
        );
    }

    #[test]
    fn app_start_rejects_failures() {
        let err = app_started("w", &status(terminated(0), terminated(3))).unwrap_err();
        assert!(matches!(
            err,
            Error::Execution(ExecutionError::NonZeroExit { exit_code: 3, .. })
        ));

        let err = app_started("w", &status(terminated(0), waiting("ErrImagePull"))).unwrap_err();
        assert!(matches!(
            err,
            Error::Execution(ExecutionError::Waiting { .. })
        ));

        let err = app_started("w", &status(terminated(2), None)).unwrap_err();
        assert!(matches!(
            err,
            Error::Execution(ExecutionError::InitFailed { exit_code: 2, .. })
        ));

        assert_eq!(
            app_started("w", &status(terminated(0), waiting("ContainerCreating"))).unwrap(),
            None
        );
    }

    #[test]
    fn final_wait_checks_exit_code() {
        assert_eq!(
            app_terminated("w", &status(None, Some(ContainerState::Running))).unwrap(),
            None
        );
        assert_eq!(app_terminated("w", &status(None, terminated(0))).unwrap(), Some(()));
        assert!(app_terminated("w", &status(None, terminated(137))).is_err());
    }
}
