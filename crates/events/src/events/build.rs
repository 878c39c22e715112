use serde::{Deserialize, Serialize};
use std::time::Duration;
use wharf_types::Status;

use super::FailureContext;

/// Lifecycle phase of a running step, as observed on its workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    /// Workload created, waiting for the init container
    Scheduling,
    /// Workspace being transferred into the init container
    Initializing,
    /// Step container running
    Running,
}

impl From<StepPhase> for Status {
    fn from(phase: StepPhase) -> Self {
        match phase {
            StepPhase::Scheduling => Status::Scheduling,
            StepPhase::Initializing => Status::Initializing,
            StepPhase::Running => Status::Running,
        }
    }
}

/// Build-specific events for the event system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    /// Build started with the stages that were selected
    BuildStarted { stages: Vec<String> },

    /// Build finished
    BuildCompleted {
        status: Status,
        stages: usize,
        duration: Duration,
    },

    /// Stage started
    StageStarted { stage: String, steps: usize },

    /// Stage finished
    StageCompleted {
        stage: String,
        status: Status,
        duration: Duration,
    },

    /// Step started
    StepStarted {
        stage: String,
        step: String,
        step_type: String,
    },

    /// Step workload moved to a new phase
    StepPhaseChanged {
        stage: String,
        step: String,
        phase: StepPhase,
    },

    /// One line of step output
    StepOutput {
        stage: String,
        step: String,
        line: String,
    },

    /// Step finished
    StepCompleted {
        stage: String,
        step: String,
        status: Status,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failure: Option<FailureContext>,
        duration: Duration,
    },
}
