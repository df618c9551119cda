//! Standard operator library
//!
//! Collection of built-in operators for common request handling steps

mod auth;
mod config;
mod debug;
mod time;
mod transform;
mod validate;

pub use auth::IdentityOperator;
pub use debug::{FailOperator, LogOperator};
pub use time::DelayOperator;
pub use transform::{ExtractOperator, RespondOperator};
pub use validate::ValidateOperator;

use piperuntime::OperatorRegistry;
use std::sync::Arc;

/// Register all standard operators with a registry
pub fn register_all(registry: &OperatorRegistry) {
    registry.register_factory(Arc::new(debug::LogOperatorFactory));
    registry.register_factory(Arc::new(debug::FailOperatorFactory));
    registry.register_factory(Arc::new(time::DelayOperatorFactory));
    registry.register_factory(Arc::new(transform::ExtractOperatorFactory));
    registry.register_factory(Arc::new(validate::ValidateOperatorFactory));
    registry.register_factory(Arc::new(auth::IdentityOperatorFactory));
    registry.register_instance("respond", Arc::new(RespondOperator));
}
