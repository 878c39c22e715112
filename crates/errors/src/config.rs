//! Configuration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("missing required field `{field}` for {step_type} step {step}")]
    MissingField {
        step: String,
        step_type: String,
        field: String,
    },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("{step_type} step {step} produced no application container")]
    NoApplicationContainer { step: String, step_type: String },

    #[error("duplicate step name {step} in stage {stage}")]
    DuplicateStep { stage: String, step: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Provide a configuration file or pass --config."),
            Self::MissingField { .. } => {
                Some("Add the missing field to the step in the build definition.")
            }
            Self::InvalidValue { .. } | Self::ParseError { .. } => {
                Some("Fix the configuration value and retry the command.")
            }
            Self::DuplicateStep { .. } => Some("Step names must be unique within a stage."),
            Self::NoApplicationContainer { .. } => {
                Some("Use one of the supported step types in the build definition.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "config.not_found",
            Self::ParseError { .. } => "config.parse_error",
            Self::MissingField { .. } => "config.missing_field",
            Self::InvalidValue { .. } => "config.invalid_value",
            Self::NoApplicationContainer { .. } => "config.no_application_container",
            Self::DuplicateStep { .. } => "config.duplicate_step",
        };
        Some(code)
    }
}
