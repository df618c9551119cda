use crate::config;
use async_trait::async_trait;
use pipecore::{Operator, OperatorError, OperatorOutput, RequestContext, Value};
use piperuntime::{OperatorFactory, OperatorMetadata};
use std::collections::HashMap;
use std::sync::Arc;

/// Logs the request input and caller, then passes the input through
pub struct LogOperator;

#[async_trait]
impl Operator for LogOperator {
    fn name(&self) -> &str {
        "debug.log"
    }

    async fn execute(
        &self,
        ctx: RequestContext,
        input: &Value,
    ) -> Result<OperatorOutput, OperatorError> {
        let user = ctx.user().map(|u| u.user_id.as_str()).unwrap_or("(anonymous)");
        tracing::info!(
            request_id = %ctx.request_id(),
            user,
            "DEBUG: {}",
            input.to_json()
        );

        Ok(OperatorOutput::new(ctx).with_data(input.clone()))
    }
}

pub struct LogOperatorFactory;

impl OperatorFactory for LogOperatorFactory {
    fn create(&self, _config: &HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError> {
        Ok(Arc::new(LogOperator))
    }

    fn operator_type(&self) -> &str {
        "debug.log"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Logs the request input for debugging".to_string(),
            category: "debug".to_string(),
        }
    }
}

/// Always fails; useful for exercising error paths of a pipeline
pub struct FailOperator {
    message: String,
}

impl FailOperator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Operator for FailOperator {
    fn name(&self) -> &str {
        "fail"
    }

    async fn execute(
        &self,
        _ctx: RequestContext,
        _input: &Value,
    ) -> Result<OperatorOutput, OperatorError> {
        Err(OperatorError::ExecutionFailed(self.message.clone()))
    }
}

pub struct FailOperatorFactory;

impl OperatorFactory for FailOperatorFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError> {
        let message = config::optional_str(config, "message")?.unwrap_or("forced failure");
        Ok(Arc::new(FailOperator::new(message)))
    }

    fn operator_type(&self) -> &str {
        "fail"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Fails with the configured message".to_string(),
            category: "debug".to_string(),
        }
    }
}
