use crate::{OperatorError, RequestContext, Value};
use async_trait::async_trait;
use std::collections::HashMap;

/// A named unit of request-handling work.
///
/// Instances bound directly in the registry are shared by every concurrent
/// request, so implementations must hold no per-request state.
#[async_trait]
pub trait Operator: Send + Sync {
    /// Name the operator reports for itself (e.g. "auth.identity").
    fn name(&self) -> &str;

    /// Run once for one request. `input` is the opaque per-request payload.
    async fn execute(
        &self,
        ctx: RequestContext,
        input: &Value,
    ) -> Result<OperatorOutput, OperatorError>;
}

/// What a successful operator hands back: the derived context and its data.
#[derive(Debug, Clone)]
pub struct OperatorOutput {
    pub context: RequestContext,
    pub data: Value,
}

impl OperatorOutput {
    pub fn new(context: RequestContext) -> Self {
        Self {
            context,
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }
}

/// Immutable description of one pipeline node.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDescriptor {
    /// Unique, case-sensitive node name within the pipeline.
    pub name: String,
    /// Registry binding used to obtain the operator.
    pub operator_type: String,
    pub config: HashMap<String, Value>,
}

impl OperatorDescriptor {
    /// Descriptor whose type is its own name and whose config is empty.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            operator_type: name.clone(),
            name,
            config: HashMap::new(),
        }
    }
}
