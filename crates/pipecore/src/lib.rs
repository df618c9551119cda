//! Core abstractions for the pipeline scheduler
//!
//! This crate provides the types every other crate shares: the operator
//! contract, the request context, pipeline definitions, results and the
//! error taxonomy. It has no scheduling logic of its own.

mod context;
mod definition;
mod error;
mod events;
mod operator;
mod result;
mod value;

pub use context::{Identity, RequestContext};
pub use definition::{
    Dependencies, DependencyDirection, DependencyEdge, OperatorSpec, PipelineConfig,
    PipelineDefinition,
};
pub use error::{
    ConfigError, ExecutionError, GraphError, OperatorError, PipelineError, RegistryError,
};
pub use events::{EventBus, ExecutionEvent, ExecutionId};
pub use operator::{Operator, OperatorDescriptor, OperatorOutput};
pub use result::{ExecutionResult, PipelineResponse};
pub use value::Value;
