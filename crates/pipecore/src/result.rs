use crate::{ExecutionError, OperatorError, PipelineError, Value};
use serde::Serialize;
use std::time::Duration;

/// Outcome of one operator invocation for one request. Never mutated after creation.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub operator_name: String,
    pub success: bool,
    pub error: Option<ExecutionError>,
    pub data: Value,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn succeeded(operator_name: impl Into<String>, data: Value, duration: Duration) -> Self {
        Self {
            operator_name: operator_name.into(),
            success: true,
            error: None,
            data,
            duration,
        }
    }

    pub fn failed(error: ExecutionError, duration: Duration) -> Self {
        Self {
            operator_name: error.operator().to_string(),
            success: false,
            error: Some(error),
            data: Value::Null,
            duration,
        }
    }
}

/// Response envelope a front end can serialise straight back to a caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub status: u16,
}

impl PipelineResponse {
    /// First failing result decides the response; otherwise the last
    /// result's data is returned with status 200.
    pub fn from_results(results: &[ExecutionResult], error: Option<&PipelineError>) -> Self {
        let failure = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .or_else(|| error.and_then(|e| e.failures().first()));

        if let Some(failure) = failure {
            return match failure.operator_error() {
                Some(OperatorError::Rejected {
                    message,
                    detail,
                    status,
                }) => Self::failure(message.clone(), detail.clone(), *status),
                _ => Self::failure("execution failed", failure.to_string(), 500),
            };
        }

        if let Some(error) = error {
            return Self::failure("scheduling failed", error.to_string(), 500);
        }

        Self {
            success: true,
            message: Some("ok".to_string()),
            data: results.last().map(|r| r.data.clone()).unwrap_or_default(),
            error: None,
            status: 200,
        }
    }

    fn failure(message: impl Into<String>, error: impl Into<String>, status: u16) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: Value::Null,
            error: Some(error.into()),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_failure_carries_its_status() {
        let results = vec![
            ExecutionResult::succeeded("validate", Value::Null, Duration::ZERO),
            ExecutionResult::failed(
                ExecutionError::Operator {
                    operator: "auth".into(),
                    source: OperatorError::rejected("unauthorized", "missing token", 401),
                },
                Duration::ZERO,
            ),
        ];

        let response = PipelineResponse::from_results(&results, None);
        assert!(!response.success);
        assert_eq!(response.status, 401);
        assert_eq!(response.error.as_deref(), Some("missing token"));
    }

    #[test]
    fn success_returns_last_data() {
        let results = vec![
            ExecutionResult::succeeded("a", Value::from("first"), Duration::ZERO),
            ExecutionResult::succeeded("b", Value::from("last"), Duration::ZERO),
        ];

        let response = PipelineResponse::from_results(&results, None);
        assert!(response.success);
        assert_eq!(response.status, 200);
        assert_eq!(response.data, Value::from("last"));
    }

    #[test]
    fn other_failures_map_to_500() {
        let results = vec![ExecutionResult::failed(
            ExecutionError::OperatorNotFound {
                operator: "gone".into(),
            },
            Duration::ZERO,
        )];

        let response = PipelineResponse::from_results(&results, None);
        assert_eq!(response.status, 500);
        assert_eq!(response.error.as_deref(), Some("operator not found: gone"));
    }
}
