//! Event handling and live build output

use crate::logging::log_event_with_tracing;
use console::{style, Style};
use wharf_events::{AppEvent, BuildEvent, EventMeta, GeneralEvent};
use wharf_types::Status;

/// Event handler for live step output and user feedback
pub struct EventHandler {
    /// Print events as JSON lines instead of text
    json_output: bool,
    /// Show phase transitions and debug events
    debug_enabled: bool,
}

impl EventHandler {
    /// Create new event handler
    pub fn new(json_output: bool, debug_enabled: bool) -> Self {
        Self {
            json_output,
            debug_enabled,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, event: AppEvent) {
        log_event_with_tracing(&event);

        if self.json_output {
            println!("{}", event_json(&event));
            return;
        }

        match event {
            AppEvent::Build(build) => self.handle_build_event(build),
            AppEvent::General(GeneralEvent::Warning { message, context }) => {
                match context {
                    Some(context) => eprintln!("{} {message}: {context}", style("warning:").yellow()),
                    None => eprintln!("{} {message}", style("warning:").yellow()),
                }
            }
            AppEvent::General(GeneralEvent::Error { message, details }) => {
                eprintln!("{} {message}", style("error:").red().bold());
                if let Some(details) = details {
                    eprintln!("  {details}");
                }
            }
            AppEvent::General(GeneralEvent::DebugLog { message, .. }) => {
                if self.debug_enabled {
                    eprintln!("{} {message}", style("debug:").dim());
                }
            }
        }
    }

    fn handle_build_event(&self, event: BuildEvent) {
        match event {
            BuildEvent::BuildStarted { stages } => {
                println!("Running stages: {}", stages.join(", "));
            }
            BuildEvent::StageStarted { stage, steps } => {
                println!(
                    "{} stage {} ({steps} steps)",
                    style("==>").cyan().bold(),
                    style(stage).bold()
                );
            }
            BuildEvent::StepStarted {
                stage,
                step,
                step_type,
            } => {
                println!("  {} {stage}/{step} ({step_type})", style("->").cyan());
            }
            BuildEvent::StepPhaseChanged { step, phase, .. } => {
                if self.debug_enabled {
                    println!("     {step}: {phase:?}");
                }
            }
            BuildEvent::StepOutput { step, line, .. } => {
                println!("{} {line}", style(format!("[{step}]")).dim());
            }
            BuildEvent::StepCompleted {
                step,
                status,
                failure,
                duration,
                ..
            } => {
                println!(
                    "  {} {step} in {duration:.1?}",
                    status_style(status).apply_to(status)
                );
                if let Some(failure) = failure {
                    println!("     {}", failure.message);
                    if let Some(hint) = failure.hint {
                        println!("     {} {hint}", style("hint:").dim());
                    }
                }
            }
            BuildEvent::StageCompleted {
                stage,
                status,
                duration,
            } => {
                println!(
                    "{} stage {stage} {} in {duration:.1?}",
                    style("<==").cyan().bold(),
                    status_style(status).apply_to(status)
                );
            }
            // The final summary is rendered from the build result
            BuildEvent::BuildCompleted { .. } => {}
        }
    }
}

/// Color used for a status
pub fn status_style(status: Status) -> Style {
    match status {
        Status::Success => Style::new().green(),
        Status::Failed => Style::new().red().bold(),
        Status::Cancelled => Style::new().yellow(),
        _ => Style::new(),
    }
}

/// Event with its metadata envelope as one JSON line
fn event_json(event: &AppEvent) -> serde_json::Value {
    let meta = with_scope(event.meta(), event);
    serde_json::json!({ "meta": meta, "event": event })
}

/// Correlate step events by `stage/step` and label them with the stage
fn with_scope(meta: EventMeta, event: &AppEvent) -> EventMeta {
    let AppEvent::Build(build) = event else {
        return meta;
    };
    match build {
        BuildEvent::StepStarted { stage, step, .. }
        | BuildEvent::StepPhaseChanged { stage, step, .. }
        | BuildEvent::StepOutput { stage, step, .. }
        | BuildEvent::StepCompleted { stage, step, .. } => meta
            .with_correlation_id(format!("{stage}/{step}"))
            .with_label("stage", stage.clone()),
        BuildEvent::StageStarted { stage, .. } | BuildEvent::StageCompleted { stage, .. } => {
            meta.with_label("stage", stage.clone())
        }
        BuildEvent::BuildStarted { .. } | BuildEvent::BuildCompleted { .. } => meta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_events_are_correlated() {
        let event = AppEvent::Build(BuildEvent::StepOutput {
            stage: "test".into(),
            step: "unit".into(),
            line: "ok".into(),
        });
        let json = event_json(&event);
        assert_eq!(json["meta"]["correlationId"], "test/unit");
        assert_eq!(json["meta"]["labels"]["stage"], "test");
        assert_eq!(json["meta"]["source"], "step_output");
        assert_eq!(json["event"]["domain"], "build");
        assert_eq!(json["event"]["event"]["line"], "ok");
    }

    #[test]
    fn general_events_have_no_correlation() {
        let event = AppEvent::General(GeneralEvent::warning("slow cluster"));
        let json = event_json(&event);
        assert!(json["meta"]["correlationId"].is_null());
        assert_eq!(json["meta"]["level"], "warn");
    }
}
