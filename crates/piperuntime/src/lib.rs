//! Pipeline scheduling runtime
//!
//! This crate provides the operator registry, the dependency graph
//! builder, the level scheduler and the execution engine that runs a
//! pipeline's levels for each request.

mod executor;
mod graph;
mod levels;
mod registry;
mod runtime;

pub use executor::{ExecuteOptions, PipelineExecutor, PipelineOutcome};
pub use graph::DependencyGraph;
pub use levels::ExecutionPlan;
pub use registry::{Binding, FnFactory, OperatorFactory, OperatorMetadata, OperatorRegistry};
pub use runtime::{LoadError, PipelineRuntime, RuntimeConfig};
