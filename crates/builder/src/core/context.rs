//! Shared state for one build invocation

use crate::orchestrator::Orchestrator;
use crate::workload::WorkloadSpecBuilder;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use wharf_config::Config;
use wharf_events::{EventEmitter, EventSender};

/// Everything a step needs besides the step itself
///
/// Cloned into every step task; the orchestrator client is shared.
#[derive(Clone)]
pub struct BuildContext {
    /// Cluster API used by every step of the run
    pub orchestrator: Arc<dyn Orchestrator>,
    /// Translates steps into workloads
    pub spec_builder: WorkloadSpecBuilder,
    /// Directory transferred into every workload
    pub workspace: PathBuf,
    /// Event sender for progress and step output
    pub event_sender: Option<EventSender>,
}

impl EventEmitter for BuildContext {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl fmt::Debug for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildContext")
            .field("spec_builder", &self.spec_builder)
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}

impl BuildContext {
    /// Create new build context
    #[must_use]
    pub fn new(orchestrator: Arc<dyn Orchestrator>, config: &Config, workspace: PathBuf) -> Self {
        Self {
            orchestrator,
            spec_builder: WorkloadSpecBuilder::new(config),
            workspace,
            event_sender: None,
        }
    }

    /// Set event sender
    #[must_use]
    pub fn with_event_sender(mut self, event_sender: EventSender) -> Self {
        self.event_sender = Some(event_sender);
        self
    }
}
