use crate::config;
use async_trait::async_trait;
use pipecore::{Operator, OperatorError, OperatorOutput, RequestContext, Value};
use piperuntime::{OperatorFactory, OperatorMetadata};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Delay execution for a configured duration
pub struct DelayOperator {
    delay: Duration,
}

impl DelayOperator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Operator for DelayOperator {
    fn name(&self) -> &str {
        "time.delay"
    }

    async fn execute(
        &self,
        ctx: RequestContext,
        input: &Value,
    ) -> Result<OperatorOutput, OperatorError> {
        tracing::debug!("Delaying for {}ms", self.delay.as_millis());

        tokio::select! {
            _ = ctx.cancellation().cancelled() => Err(OperatorError::Cancelled),
            _ = sleep(self.delay) => Ok(OperatorOutput::new(ctx.clone()).with_data(input.clone())),
        }
    }
}

pub struct DelayOperatorFactory;

impl OperatorFactory for DelayOperatorFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError> {
        // Default to 1 second if not specified
        let delay_ms = config::optional_u64(config, "delay_ms")?.unwrap_or(1000);
        Ok(Arc::new(DelayOperator::new(Duration::from_millis(delay_ms))))
    }

    fn operator_type(&self) -> &str {
        "time.delay"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
        }
    }
}
