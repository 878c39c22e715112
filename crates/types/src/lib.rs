#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for the wharf build runner
//!
//! This crate provides the build definition consumed by the runner
//! (stages of steps, each step carrying a typed action) and the
//! result tree it produces.

pub mod definition;
pub mod result;
pub mod step;

pub use definition::{BuildOptions, Definition, Stage, Step};
pub use result::{BuildResult, StageResult, Status, StepResult};
pub use step::{
    ContainerStep, DockerStep, HelmPackageStep, HelmStep, KubectlStep, NuGetPackageStep, StepType,
};
