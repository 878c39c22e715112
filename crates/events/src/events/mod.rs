use serde::{Deserialize, Serialize};

use crate::{EventMeta, EventSource};
use wharf_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stable error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    /// Optional remediation hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    /// Construct a new failure context.
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod build;
pub mod general;

pub use build::*;
pub use general::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, debug logs)
    General(GeneralEvent),

    /// Build orchestration events (stages, steps, output)
    Build(BuildEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Build(BuildEvent::StepOutput { .. }) => EventSource::STEP_OUTPUT,
            Self::Build(_) => EventSource::BUILD,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        use wharf_types::Status;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Build(
                BuildEvent::StepCompleted {
                    status: Status::Failed,
                    ..
                }
                | BuildEvent::StageCompleted {
                    status: Status::Failed,
                    ..
                }
                | BuildEvent::BuildCompleted {
                    status: Status::Failed,
                    ..
                },
            ) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Build(BuildEvent::StepCompleted {
                status: Status::Cancelled,
                ..
            }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Build(BuildEvent::StepPhaseChanged { .. }) => Level::DEBUG,

            Self::Build(BuildEvent::StepOutput { .. }) => Level::TRACE,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "wharf::events::general",
            Self::Build(_) => "wharf::events::build",
        }
    }

    /// Metadata envelope for this event, used for JSON output
    #[must_use]
    pub fn meta(&self) -> EventMeta {
        EventMeta::new(self.log_level(), self.event_source())
    }
}
