use crate::config;
use async_trait::async_trait;
use pipecore::{Operator, OperatorError, OperatorOutput, RequestContext, Value};
use piperuntime::{OperatorFactory, OperatorMetadata};
use std::collections::HashMap;
use std::sync::Arc;

/// Reject requests whose input object lacks a required field
pub struct ValidateOperator {
    required: Vec<String>,
}

impl ValidateOperator {
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }
}

#[async_trait]
impl Operator for ValidateOperator {
    fn name(&self) -> &str {
        "request.validate"
    }

    async fn execute(
        &self,
        ctx: RequestContext,
        input: &Value,
    ) -> Result<OperatorOutput, OperatorError> {
        if input.as_object().is_none() {
            return Err(OperatorError::rejected(
                "invalid request",
                format!("expected an object body, got {}", input.kind()),
                400,
            ));
        }

        let missing: Vec<&str> = self
            .required
            .iter()
            .map(String::as_str)
            .filter(|field| input.get(field).map_or(true, Value::is_null))
            .collect();

        if !missing.is_empty() {
            return Err(OperatorError::rejected(
                "invalid request",
                format!("missing fields: {}", missing.join(", ")),
                400,
            ));
        }

        Ok(OperatorOutput::new(ctx))
    }
}

pub struct ValidateOperatorFactory;

impl OperatorFactory for ValidateOperatorFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError> {
        Ok(Arc::new(ValidateOperator::new(config::string_list(
            config, "required",
        )?)))
    }

    fn operator_type(&self) -> &str {
        "request.validate"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Check the request body carries required fields".to_string(),
            category: "request".to_string(),
        }
    }
}
