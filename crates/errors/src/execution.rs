//! Step execution error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ExecutionError {
    #[error("init container of {workload} exited with code {exit_code}")]
    InitFailed { workload: String, exit_code: i32 },

    #[error("step container of {workload} exited with code {exit_code}")]
    NonZeroExit { workload: String, exit_code: i32 },

    #[error("step container of {workload} cannot start: {reason}: {message}")]
    Waiting {
        workload: String,
        reason: String,
        message: String,
    },

    #[error("workspace transfer into {workload} failed: {message}")]
    Transfer { workload: String, message: String },
}

impl UserFacingError for ExecutionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Waiting { .. } => {
                Some("Check the step image name, pull secrets and referenced secrets.")
            }
            Self::Transfer { .. } => {
                Some("Make sure the init image provides `tar` and the workspace is readable.")
            }
            _ => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InitFailed { .. } => "execution.init_failed",
            Self::NonZeroExit { .. } => "execution.non_zero_exit",
            Self::Waiting { .. } => "execution.waiting",
            Self::Transfer { .. } => "execution.transfer",
        };
        Some(code)
    }
}
