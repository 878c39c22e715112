//! Result tree produced by a build

use crate::BuildOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use wharf_errors::Error;

/// Lifecycle status shared by builds, stages and steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Unknown,
    None,
    Scheduling,
    Initializing,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl Status {
    /// Classify the outcome of a step
    ///
    /// Cancellation is only reported when the terminating error is exactly a
    /// cancellation signal; every other error is a failure.
    #[must_use]
    pub fn from_outcome<T>(outcome: &Result<T, Error>) -> Self {
        match outcome {
            Ok(_) => Self::Success,
            Err(err) if err.is_cancelled() => Self::Cancelled,
            Err(_) => Self::Failed,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "Unknown",
            Self::None => "None",
            Self::Scheduling => "Scheduling",
            Self::Initializing => "Initializing",
            Self::Running => "Running",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(s)
    }
}

/// Outcome of a whole build invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildResult {
    pub status: Status,
    pub options: BuildOptions,
    pub stages: Vec<StageResult>,
    pub duration: Duration,
}

/// Outcome of one stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub name: String,
    pub status: Status,
    /// Step results in completion order
    pub steps: Vec<StepResult>,
    pub duration: Duration,
}

/// Outcome of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub status: Status,
    /// Type tag of the step, e.g. `container`
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
    pub duration: Duration,
}

impl StepResult {
    /// Build a step result from the outcome of its execution
    pub fn from_outcome(
        name: impl Into<String>,
        step_type: impl Into<String>,
        outcome: Result<(), Error>,
        duration: Duration,
    ) -> Self {
        let status = Status::from_outcome(&outcome);
        Self {
            name: name.into(),
            status,
            step_type: step_type.into(),
            error: outcome.err(),
            duration,
        }
    }
}
