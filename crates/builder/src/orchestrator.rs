//! Seam between the step executor and the cluster API
//!
//! The executor only needs five operations: create a workload, watch it,
//! exec into one of its containers, follow a container's logs, and delete
//! it. Implementations must be safe to share across all step tasks of a run.

use crate::workload::WorkloadSpec;
use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;
use wharf_errors::{Error, WorkloadPhase};

/// Byte stream piped into an exec'd command's stdin
pub type ExecInput = Box<dyn AsyncRead + Send + Unpin>;

/// Observed state of a single container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Waiting {
        reason: String,
        message: String,
    },
    Running,
    Terminated {
        exit_code: i32,
        reason: String,
    },
}

/// Container states of a workload at one point in time
///
/// `None` means the orchestrator has not reported the container yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub init: Option<ContainerState>,
    pub step: Option<ContainerState>,
}

/// One event from a workload watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadEvent {
    /// The workload was added or modified; carries its current status
    Modified(WorkloadStatus),
    /// The workload no longer exists
    Deleted,
}

/// Cluster orchestrator operations used by the step executor
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Create a workload and return the name the orchestrator assigned
    async fn create(&self, spec: &WorkloadSpec) -> Result<String, Error>;

    /// Subscribe to changes of one named workload
    ///
    /// The stream yields the current state first. It ends when the
    /// underlying subscription closes.
    async fn watch(
        &self,
        workload: &str,
        phase: WorkloadPhase,
    ) -> Result<BoxStream<'static, Result<WorkloadEvent, Error>>, Error>;

    /// Run `command` inside `container` and wait for it to exit
    ///
    /// When `stdin` is given it is copied into the command until EOF. A
    /// non-zero exit of the command is an error.
    async fn exec(
        &self,
        workload: &str,
        container: &str,
        phase: WorkloadPhase,
        command: &[String],
        stdin: Option<ExecInput>,
    ) -> Result<(), Error>;

    /// Follow the output of `container`, one item per line
    async fn logs(
        &self,
        workload: &str,
        container: &str,
    ) -> Result<BoxStream<'static, Result<String, Error>>, Error>;

    /// Delete a workload immediately, without a grace period
    async fn delete(&self, workload: &str) -> Result<(), Error>;
}
