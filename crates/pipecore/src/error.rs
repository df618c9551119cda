use thiserror::Error;

/// Failure reported by an operator's own `execute`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInput {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A business-level refusal; `status` is an HTTP-style code the front end may use.
    #[error("{message}: {detail}")]
    Rejected {
        message: String,
        detail: String,
        status: u16,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Cancelled")]
    Cancelled,
}

impl OperatorError {
    pub fn rejected(message: impl Into<String>, detail: impl Into<String>, status: u16) -> Self {
        OperatorError::Rejected {
            message: message.into(),
            detail: detail.into(),
            status,
        }
    }
}

/// Why a single operator invocation did not succeed. Stored on its result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("operator not found: {operator}")]
    OperatorNotFound { operator: String },

    #[error("failed to construct operator {operator}: {message}")]
    Construction { operator: String, message: String },

    #[error("{operator}: {source}")]
    Operator {
        operator: String,
        source: OperatorError,
    },

    #[error("{operator}: deadline exceeded")]
    DeadlineExceeded { operator: String },

    #[error("{operator}: cancelled")]
    Cancelled { operator: String },

    #[error("{operator}: task panicked")]
    Panicked { operator: String },
}

impl ExecutionError {
    /// Name of the operator this failure belongs to.
    pub fn operator(&self) -> &str {
        match self {
            ExecutionError::OperatorNotFound { operator }
            | ExecutionError::Construction { operator, .. }
            | ExecutionError::Operator { operator, .. }
            | ExecutionError::DeadlineExceeded { operator }
            | ExecutionError::Cancelled { operator }
            | ExecutionError::Panicked { operator } => operator,
        }
    }

    /// The operator-reported error, when the operator itself failed.
    pub fn operator_error(&self) -> Option<&OperatorError> {
        match self {
            ExecutionError::Operator { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Build-time failures. A pipeline that fails to build is never registered.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("pipeline '{pipeline}' references unknown operator '{name}'")]
    UnknownOperator { pipeline: String, name: String },

    #[error("operator '{name}' in pipeline '{pipeline}' depends on itself")]
    SelfDependency { pipeline: String, name: String },

    #[error("cyclic dependency detected in pipeline '{pipeline}' ({} operators unresolved)", .unresolved.len())]
    CyclicDependency {
        pipeline: String,
        unresolved: Vec<String>,
    },

    #[error("pipeline '{pipeline}' declares no operators")]
    EmptyPipeline { pipeline: String },
}

/// Execute-time failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("execution order not found for pipeline: {pipeline}")]
    NotFound { pipeline: String },

    #[error("operator {} failed: {source}", .source.operator())]
    OperatorFailed { source: ExecutionError },

    #[error("parallel execution failed at level {level}: [{}]", join_failures(.failures))]
    LevelFailed {
        level: usize,
        failures: Vec<ExecutionError>,
    },
}

impl PipelineError {
    /// Every operator failure this error wraps.
    pub fn failures(&self) -> &[ExecutionError] {
        match self {
            PipelineError::NotFound { .. } => &[],
            PipelineError::OperatorFailed { source } => std::slice::from_ref(source),
            PipelineError::LevelFailed { failures, .. } => failures,
        }
    }
}

fn join_failures(failures: &[ExecutionError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("operator not found: {name}")]
    NotFound { name: String },

    #[error("factory for '{name}' failed: {source}")]
    Construction {
        name: String,
        source: OperatorError,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read pipeline config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse pipeline config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid pipeline config: {0}")]
    Invalid(String),
}
