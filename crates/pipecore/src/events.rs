use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type ExecutionId = Uuid;

/// Events emitted while a pipeline runs for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: ExecutionId,
        pipeline: String,
        parallel: bool,
        timestamp: DateTime<Utc>,
    },
    LevelStarted {
        execution_id: ExecutionId,
        level: usize,
        operators: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    OperatorStarted {
        execution_id: ExecutionId,
        operator: String,
        level: usize,
        timestamp: DateTime<Utc>,
    },
    OperatorCompleted {
        execution_id: ExecutionId,
        operator: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    OperatorFailed {
        execution_id: ExecutionId,
        operator: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    PipelineCompleted {
        execution_id: ExecutionId,
        pipeline: String,
        success: bool,
        attempted: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionEvent::PipelineStarted { execution_id, .. }
            | ExecutionEvent::LevelStarted { execution_id, .. }
            | ExecutionEvent::OperatorStarted { execution_id, .. }
            | ExecutionEvent::OperatorCompleted { execution_id, .. }
            | ExecutionEvent::OperatorFailed { execution_id, .. }
            | ExecutionEvent::PipelineCompleted { execution_id, .. } => *execution_id,
        }
    }
}

/// Process-wide fan-out of execution events. Sending with no subscribers is a no-op.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}
