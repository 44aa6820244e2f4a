//! Graph execution runtime
//!
//! This crate provides the engine that runs a pixelcore graph node by node,
//! with run handles for cancellation, per-node reports and progress events.

mod executor;
mod runtime;

pub use executor::{ErrorPolicy, ExecutionEngine, NodeReport, RunHandle, RunReport};
pub use runtime::{Runtime, RuntimeConfig};
