#![deny(clippy::pedantic, unsafe_code)]
//! Build orchestration for wharf
//!
//! This crate runs a build definition against a cluster orchestrator:
//! stages run one after another, the steps of a stage run in parallel, and
//! every step executes in its own short-lived workload.

mod core;
pub mod orchestrator;
mod stages;
mod utils;
pub mod workload;

pub use core::builder::Builder;
pub use core::context::BuildContext;
pub use orchestrator::{ContainerState, ExecInput, Orchestrator, WorkloadEvent, WorkloadStatus};
pub use utils::archive::workspace_tar_stream;
pub use workload::{
    continue_command, generated_name, transfer_command, WorkloadSpec, WorkloadSpecBuilder,
};
