use crate::config;
use async_trait::async_trait;
use pipecore::{Operator, OperatorError, OperatorOutput, RequestContext, Value};
use piperuntime::{OperatorFactory, OperatorMetadata};
use std::collections::HashMap;
use std::sync::Arc;

/// Return one field of the input object as data
pub struct ExtractOperator {
    field: String,
}

impl ExtractOperator {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

#[async_trait]
impl Operator for ExtractOperator {
    fn name(&self) -> &str {
        "json.extract"
    }

    async fn execute(
        &self,
        ctx: RequestContext,
        input: &Value,
    ) -> Result<OperatorOutput, OperatorError> {
        if input.as_object().is_none() {
            return Err(OperatorError::InvalidInput {
                field: "input".to_string(),
                expected: "object".to_string(),
                actual: input.kind().to_string(),
            });
        }

        let value = input
            .get(&self.field)
            .cloned()
            .ok_or_else(|| OperatorError::MissingInput(self.field.clone()))?;

        Ok(OperatorOutput::new(ctx).with_data(value))
    }
}

pub struct ExtractOperatorFactory;

impl OperatorFactory for ExtractOperatorFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError> {
        let field = config::require_str(config, "field")?;
        Ok(Arc::new(ExtractOperator::new(field)))
    }

    fn operator_type(&self) -> &str {
        "json.extract"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Extract a field from the request input".to_string(),
            category: "transform".to_string(),
        }
    }
}

/// Echo the input back together with the caller's identity
pub struct RespondOperator;

#[async_trait]
impl Operator for RespondOperator {
    fn name(&self) -> &str {
        "respond"
    }

    async fn execute(
        &self,
        ctx: RequestContext,
        input: &Value,
    ) -> Result<OperatorOutput, OperatorError> {
        let mut body = Value::object();
        body.insert("request_id", ctx.request_id().to_string());
        body.insert("input", input.clone());
        if let Some(user) = ctx.user() {
            body.insert("user", user.user_id.as_str());
        }

        Ok(OperatorOutput::new(ctx).with_data(body))
    }
}
