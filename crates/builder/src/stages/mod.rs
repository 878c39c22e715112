//! Stage and step execution
//!
//! Steps of a stage run concurrently, one task per step; each step drives
//! its own workload through the orchestrator.

pub(crate) mod stage;
pub(crate) mod step;
