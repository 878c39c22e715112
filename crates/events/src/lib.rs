#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication in wharf
//!
//! Build progress, step output and warnings all travel as events over an
//! unbounded channel and the CLI renders them.
//! No crate below the CLI prints directly.

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod events;
pub use events::{AppEvent, BuildEvent, FailureContext, GeneralEvent, StepPhase};

use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use wharf_types::{StageResult, Status, StepResult};

/// Type alias for event sender using the `AppEvent` system
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for event receiver using the `AppEvent` system
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel with the `AppEvent` system
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout wharf
///
/// This trait provides a single, consistent API for emitting events regardless of
/// whether you have a raw `EventSender` or a struct that contains one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(event);
        }
    }

    /// Emit a debug log event
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a warning event
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit a warning event with context
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    /// Emit an error event
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit a stage started event
    fn emit_stage_started(&self, stage: impl Into<String>, steps: usize) {
        self.emit(AppEvent::Build(BuildEvent::StageStarted {
            stage: stage.into(),
            steps,
        }));
    }

    /// Emit a stage completed event
    fn emit_stage_completed(&self, result: &StageResult) {
        self.emit(AppEvent::Build(BuildEvent::StageCompleted {
            stage: result.name.clone(),
            status: result.status,
            duration: result.duration,
        }));
    }

    /// Emit a step started event
    fn emit_step_started(
        &self,
        stage: impl Into<String>,
        step: impl Into<String>,
        step_type: impl Into<String>,
    ) {
        self.emit(AppEvent::Build(BuildEvent::StepStarted {
            stage: stage.into(),
            step: step.into(),
            step_type: step_type.into(),
        }));
    }

    /// Emit a step phase transition
    fn emit_step_phase(&self, stage: impl Into<String>, step: impl Into<String>, phase: StepPhase) {
        self.emit(AppEvent::Build(BuildEvent::StepPhaseChanged {
            stage: stage.into(),
            step: step.into(),
            phase,
        }));
    }

    /// Emit one line of step output
    fn emit_step_output(
        &self,
        stage: impl Into<String>,
        step: impl Into<String>,
        line: impl Into<String>,
    ) {
        self.emit(AppEvent::Build(BuildEvent::StepOutput {
            stage: stage.into(),
            step: step.into(),
            line: line.into(),
        }));
    }

    /// Emit a step completed event
    fn emit_step_completed(&self, stage: impl Into<String>, result: &StepResult) {
        self.emit(AppEvent::Build(BuildEvent::StepCompleted {
            stage: stage.into(),
            step: result.name.clone(),
            status: result.status,
            failure: result.error.as_ref().map(FailureContext::from_error),
            duration: result.duration,
        }));
    }

    /// Emit a build completed event
    fn emit_build_completed(&self, status: Status, stages: usize, duration: Duration) {
        self.emit(AppEvent::Build(BuildEvent::BuildCompleted {
            status,
            stages,
            duration,
        }));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
/// This allows `EventSender` to be used directly where `EventEmitter` is expected
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}
