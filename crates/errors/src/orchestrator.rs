//! Cluster orchestrator error types

use std::borrow::Cow;
use std::fmt;

use crate::UserFacingError;
use thiserror::Error;

/// Lifecycle phase of a workload in which an orchestrator call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WorkloadPhase {
    Init,
    Transfer,
    Continue,
    App,
}

impl fmt::Display for WorkloadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Transfer => write!(f, "transfer"),
            Self::Continue => write!(f, "continue"),
            Self::App => write!(f, "app"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum OrchestratorError {
    #[error("client setup failed: {message}")]
    Client { message: String },

    #[error("create workload {name_prefix}: {message}")]
    Create { name_prefix: String, message: String },

    #[error("watch workload {workload} during {phase} phase: {message}")]
    Watch {
        workload: String,
        phase: WorkloadPhase,
        message: String,
    },

    #[error("watch of workload {workload} closed during {phase} phase")]
    WatchClosed {
        workload: String,
        phase: WorkloadPhase,
    },

    #[error("workload {workload} was deleted during {phase} phase")]
    WorkloadDeleted {
        workload: String,
        phase: WorkloadPhase,
    },

    #[error("exec in workload {workload} during {phase} phase: {message}")]
    Exec {
        workload: String,
        phase: WorkloadPhase,
        message: String,
    },

    #[error("follow logs of workload {workload}: {message}")]
    Logs { workload: String, message: String },

    #[error("delete workload {workload}: {message}")]
    Delete { workload: String, message: String },
}

impl UserFacingError for OrchestratorError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Client { .. } => {
                Some("Check the kubeconfig and that the cluster API server is reachable.")
            }
            Self::Create { .. } => {
                Some("Check namespace quotas and that the service account may create pods.")
            }
            Self::WorkloadDeleted { .. } => {
                Some("The pod was removed externally; check for evictions or manual deletes.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Client { .. } | Self::Watch { .. } | Self::WatchClosed { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::Client { .. } => "orchestrator.client",
            Self::Create { .. } => "orchestrator.create",
            Self::Watch { .. } => "orchestrator.watch",
            Self::WatchClosed { .. } => "orchestrator.watch_closed",
            Self::WorkloadDeleted { .. } => "orchestrator.workload_deleted",
            Self::Exec { .. } => "orchestrator.exec",
            Self::Logs { .. } => "orchestrator.logs",
            Self::Delete { .. } => "orchestrator.delete",
        };
        Some(code)
    }
}
