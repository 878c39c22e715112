//! Core module containing the build coordinator and its shared context

pub mod builder;
pub mod context;
