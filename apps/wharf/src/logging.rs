//! Structured logging integration for events
//!
//! Every event that reaches the CLI is also recorded through `tracing`, so
//! `--debug` logs carry the complete build history with structured fields.

use tracing::{debug, error, info, trace, warn, Level};
use wharf_events::{AppEvent, BuildEvent, GeneralEvent};

/// Log an `AppEvent` at its own level with structured fields
pub fn log_event_with_tracing(event: &AppEvent) {
    let level = event.log_level();
    let source = event.event_source();
    let source = source.as_str();

    match event {
        AppEvent::General(GeneralEvent::Warning { message, context }) => {
            warn!(source, context = ?context, "{message}");
        }
        AppEvent::General(GeneralEvent::Error { message, details }) => {
            error!(source, details = ?details, "{message}");
        }
        AppEvent::General(GeneralEvent::DebugLog { message, context }) => {
            debug!(source, context = ?context, "{message}");
        }
        AppEvent::Build(BuildEvent::StepOutput { stage, step, line }) => {
            trace!(source, stage = %stage, step = %step, "{line}");
        }
        AppEvent::Build(BuildEvent::StepCompleted {
            stage,
            step,
            status,
            failure,
            duration,
        }) => {
            let message = failure.as_ref().map(|f| f.message.as_str());
            match level {
                Level::ERROR => error!(
                    source, stage = %stage, step = %step, status = %status,
                    duration = ?duration, failure = ?message, "Step completed"
                ),
                Level::WARN => warn!(
                    source, stage = %stage, step = %step, status = %status,
                    duration = ?duration, "Step completed"
                ),
                _ => info!(
                    source, stage = %stage, step = %step, status = %status,
                    duration = ?duration, "Step completed"
                ),
            }
        }
        AppEvent::Build(build) => {
            if level == Level::ERROR {
                error!(source, event = ?build, "Build event");
            } else if level == Level::DEBUG {
                debug!(source, event = ?build, "Build event");
            } else {
                info!(source, event = ?build, "Build event");
            }
        }
    }
}
