use crate::config;
use async_trait::async_trait;
use pipecore::{Identity, Operator, OperatorError, OperatorOutput, RequestContext, Value};
use piperuntime::{OperatorFactory, OperatorMetadata};
use std::collections::HashMap;
use std::sync::Arc;

/// Attach the caller named in the request input to the context.
///
/// No credential is verified here; the operator only lifts an already
/// authenticated identity out of the payload.
pub struct IdentityOperator {
    field: String,
}

impl IdentityOperator {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

#[async_trait]
impl Operator for IdentityOperator {
    fn name(&self) -> &str {
        "auth.identity"
    }

    async fn execute(
        &self,
        ctx: RequestContext,
        input: &Value,
    ) -> Result<OperatorOutput, OperatorError> {
        let user_id = input
            .get(&self.field)
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                OperatorError::rejected(
                    "unauthorized",
                    format!("'{}' is required", self.field),
                    401,
                )
            })?;

        let mut identity = Identity::new(user_id);
        if let Some(roles) = input.get("roles").and_then(Value::as_array) {
            identity.roles = roles
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        let mut next = ctx.with_user(identity);
        if let Some(token) = input.get("token").and_then(Value::as_str) {
            next = next.with_token(token);
        }

        tracing::debug!(user = user_id, "Attached identity to request");
        Ok(OperatorOutput::new(next).with_data(user_id))
    }
}

pub struct IdentityOperatorFactory;

impl OperatorFactory for IdentityOperatorFactory {
    fn create(&self, config: &HashMap<String, Value>) -> Result<Arc<dyn Operator>, OperatorError> {
        let field = config::optional_str(config, "field")?.unwrap_or("user");
        Ok(Arc::new(IdentityOperator::new(field)))
    }

    fn operator_type(&self) -> &str {
        "auth.identity"
    }

    fn metadata(&self) -> OperatorMetadata {
        OperatorMetadata {
            description: "Attach the request's user to the context".to_string(),
            category: "auth".to_string(),
        }
    }
}
