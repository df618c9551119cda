#![allow(dead_code)]

use async_trait::async_trait;
use pipecore::{
    Identity, Operator, OperatorError, OperatorOutput, PipelineDefinition, RequestContext, Value,
};
use piperuntime::{OperatorRegistry, PipelineRuntime, RuntimeConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a [`TestOperator`] does when executed.
#[derive(Clone)]
pub enum Behavior {
    Succeed,
    Fail(&'static str),
    SetUser(&'static str),
    /// Returns the user id it sees in its context as data.
    ReportUser,
    Sleep(Duration),
    Panic,
}

/// Shared record of start/end events across operators of one test.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

pub struct TestOperator {
    name: String,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    journal: Journal,
}

impl TestOperator {
    pub fn new(name: &str, behavior: Behavior, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            journal: journal.clone(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Operator for TestOperator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(
        &self,
        ctx: RequestContext,
        _input: &Value,
    ) -> Result<OperatorOutput, OperatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("start:{}", self.name));

        let output = match &self.behavior {
            Behavior::Succeed => Ok(OperatorOutput::new(ctx).with_data(self.name.as_str())),
            Behavior::Fail(message) => Err(OperatorError::ExecutionFailed(message.to_string())),
            Behavior::SetUser(user) => Ok(OperatorOutput::new(ctx.with_user(Identity::new(*user)))),
            Behavior::ReportUser => {
                let user = ctx
                    .user()
                    .map(|u| Value::from(u.user_id.as_str()))
                    .unwrap_or_default();
                Ok(OperatorOutput::new(ctx).with_data(user))
            }
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(OperatorOutput::new(ctx))
            }
            Behavior::Panic => panic!("operator {} exploded", self.name),
        };

        self.journal.push(format!("end:{}", self.name));
        output
    }
}

/// Registry plus handles to every registered test operator.
pub struct Harness {
    pub registry: Arc<OperatorRegistry>,
    pub journal: Journal,
    operators: Vec<Arc<TestOperator>>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(OperatorRegistry::new()),
            journal: Journal::default(),
            operators: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, behavior: Behavior) -> Self {
        let operator = Arc::new(TestOperator::new(name, behavior, &self.journal));
        self.registry.register_instance(name, operator.clone());
        self.operators.push(operator);
        self
    }

    pub fn calls(&self, name: &str) -> usize {
        self.operators
            .iter()
            .find(|op| op.name() == name)
            .map(|op| op.calls())
            .unwrap_or(0)
    }

    pub fn runtime(&self, definition: &PipelineDefinition) -> PipelineRuntime {
        let runtime = PipelineRuntime::with_registry(self.registry.clone(), RuntimeConfig::default());
        runtime
            .load_pipeline(definition)
            .expect("pipeline should load");
        runtime
    }
}

/// Registry with a succeeding operator under each name.
pub fn registry_with(names: &[&str]) -> OperatorRegistry {
    let journal = Journal::default();
    let registry = OperatorRegistry::new();
    for name in names {
        registry.register_instance(*name, Arc::new(TestOperator::new(name, Behavior::Succeed, &journal)));
    }
    registry
}
