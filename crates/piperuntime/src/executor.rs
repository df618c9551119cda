use crate::levels::ExecutionPlan;
use crate::registry::OperatorRegistry;
use chrono::Utc;
use futures::FutureExt;
use pipecore::{
    EventBus, ExecutionError, ExecutionEvent, ExecutionId, ExecutionResult, OperatorDescriptor,
    PipelineError, PipelineResponse, RegistryError, RequestContext, Value,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Per-request execution options
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Run each level's operators concurrently.
    pub parallel: bool,
    /// Deadline relative to the start of execution.
    pub timeout: Option<Duration>,
    /// Opaque request payload handed to every operator.
    pub input: Value,
}

impl ExecuteOptions {
    pub fn new(input: impl Into<Value>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of running one pipeline for one request
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub execution_id: ExecutionId,
    pub pipeline: String,
    /// One entry per attempted operator, in level order.
    pub results: Vec<ExecutionResult>,
    /// Context as it stood after the last successful level.
    pub context: RequestContext,
    pub error: Option<PipelineError>,
    pub duration: Duration,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Name of the first operator that failed, if any.
    pub fn failed_operator(&self) -> Option<&str> {
        self.results
            .iter()
            .find(|r| !r.success)
            .map(|r| r.operator_name.as_str())
    }

    pub fn response(&self) -> PipelineResponse {
        PipelineResponse::from_results(&self.results, self.error.as_ref())
    }

    pub fn into_result(self) -> Result<Vec<ExecutionResult>, PipelineError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.results),
        }
    }
}

/// Outcome of one operator invocation: its result and, on success, its context.
struct Invocation {
    result: ExecutionResult,
    context: Option<RequestContext>,
}

impl Invocation {
    fn failed(error: ExecutionError, duration: Duration) -> Self {
        Self {
            result: ExecutionResult::failed(error, duration),
            context: None,
        }
    }
}

/// Why a parallel barrier stopped waiting before every task finished.
#[derive(Clone, Copy)]
enum Interrupt {
    Cancelled,
    DeadlineExceeded,
}

/// Walks an execution plan level by level for one request.
pub struct PipelineExecutor {
    registry: Arc<OperatorRegistry>,
    events: Arc<EventBus>,
}

impl PipelineExecutor {
    pub fn new(registry: Arc<OperatorRegistry>, events: Arc<EventBus>) -> Self {
        Self { registry, events }
    }

    /// Run every level of `plan` against `ctx`.
    ///
    /// Stops at the first failure; the returned results then end with the
    /// failing operator (sequential) or the whole failing level (parallel).
    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        ctx: RequestContext,
        options: ExecuteOptions,
    ) -> PipelineOutcome {
        let execution_id = ExecutionId::new_v4();
        let start_time = Instant::now();

        self.events.emit(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline: plan.pipeline().to_string(),
            parallel: options.parallel,
            timestamp: Utc::now(),
        });

        tracing::info!(
            pipeline = plan.pipeline(),
            %execution_id,
            parallel = options.parallel,
            "Starting pipeline execution"
        );

        // A child token lets the engine cancel its own operators on a
        // deadline without touching the caller's token.
        let mut ctx = ctx.with_cancellation(ctx.cancellation().child_token());
        if let Some(timeout) = options.timeout {
            ctx = ctx.with_timeout(timeout);
        }
        let input = Arc::new(options.input);

        let (results, context, error) = if options.parallel {
            self.execute_parallel(plan, ctx, input, execution_id).await
        } else {
            self.execute_sequential(plan, ctx, input, execution_id).await
        };

        let duration = start_time.elapsed();
        let success = error.is_none();

        self.events.emit(ExecutionEvent::PipelineCompleted {
            execution_id,
            pipeline: plan.pipeline().to_string(),
            success,
            attempted: results.len(),
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });

        match &error {
            None => tracing::info!(
                pipeline = plan.pipeline(),
                %execution_id,
                "Pipeline completed in {}ms",
                duration.as_millis()
            ),
            Some(e) => tracing::warn!(
                pipeline = plan.pipeline(),
                %execution_id,
                "Pipeline failed after {}ms: {}",
                duration.as_millis(),
                e
            ),
        }

        PipelineOutcome {
            execution_id,
            pipeline: plan.pipeline().to_string(),
            results,
            context,
            error,
            duration,
        }
    }

    async fn execute_sequential(
        &self,
        plan: &ExecutionPlan,
        mut ctx: RequestContext,
        input: Arc<Value>,
        execution_id: ExecutionId,
    ) -> (Vec<ExecutionResult>, RequestContext, Option<PipelineError>) {
        let mut results = Vec::with_capacity(plan.operator_count());

        for (level_idx, level) in plan.levels().iter().enumerate() {
            self.emit_level_started(execution_id, level_idx, level);

            for name in level {
                let invocation = invoke_guarded(
                    self.registry.clone(),
                    self.events.clone(),
                    execution_id,
                    level_idx,
                    descriptor_for(plan, name),
                    ctx.clone(),
                    input.clone(),
                )
                .await;

                let Invocation { result, context } = invocation;
                let failure = result.error.clone();
                results.push(result);

                match (failure, context) {
                    (Some(source), _) => {
                        return (results, ctx, Some(PipelineError::OperatorFailed { source }));
                    }
                    // Request-scoped fields stay anchored to this request.
                    (None, Some(next)) => ctx = ctx.merge_siblings(std::slice::from_ref(&next)),
                    (None, None) => {}
                }
            }
        }

        (results, ctx, None)
    }

    async fn execute_parallel(
        &self,
        plan: &ExecutionPlan,
        mut ctx: RequestContext,
        input: Arc<Value>,
        execution_id: ExecutionId,
    ) -> (Vec<ExecutionResult>, RequestContext, Option<PipelineError>) {
        let mut results = Vec::with_capacity(plan.operator_count());

        for (level_idx, level) in plan.levels().iter().enumerate() {
            self.emit_level_started(execution_id, level_idx, level);

            // Every operator in the level sees the same starting context.
            let level_ctx = ctx.clone();
            let level_start = Instant::now();
            let mut tasks: JoinSet<(usize, Invocation)> = JoinSet::new();

            for (idx, name) in level.iter().enumerate() {
                let registry = self.registry.clone();
                let events = self.events.clone();
                let descriptor = descriptor_for(plan, name);
                let task_ctx = level_ctx.clone();
                let task_input = input.clone();

                tasks.spawn(async move {
                    let invocation = invoke_guarded(
                        registry,
                        events,
                        execution_id,
                        level_idx,
                        descriptor,
                        task_ctx,
                        task_input,
                    )
                    .await;
                    (idx, invocation)
                });
            }

            let mut slots: Vec<Option<Invocation>> = level.iter().map(|_| None).collect();
            let interrupt = self.wait_for_level(&mut tasks, &mut slots, &level_ctx).await;
            if interrupt.is_some() {
                // Anything still running is cancelled before the level is left.
                level_ctx.cancellation().cancel();
                tasks.abort_all();
                drain_level(&mut tasks, &mut slots).await;
            }

            let mut failures = Vec::new();
            let mut contexts = Vec::new();
            for (slot, name) in slots.into_iter().zip(level) {
                let invocation = slot.unwrap_or_else(|| {
                    let operator = name.clone();
                    let error = match interrupt {
                        Some(Interrupt::DeadlineExceeded) => {
                            ExecutionError::DeadlineExceeded { operator }
                        }
                        Some(Interrupt::Cancelled) => ExecutionError::Cancelled { operator },
                        // Only a task that died without reporting leaves a gap.
                        None => ExecutionError::Panicked { operator },
                    };
                    self.events.emit(ExecutionEvent::OperatorFailed {
                        execution_id,
                        operator: name.clone(),
                        error: error.to_string(),
                        timestamp: Utc::now(),
                    });
                    Invocation::failed(error, level_start.elapsed())
                });

                if let Some(error) = &invocation.result.error {
                    failures.push(error.clone());
                } else if let Some(context) = invocation.context {
                    contexts.push(context);
                }
                results.push(invocation.result);
            }

            if !failures.is_empty() {
                tracing::warn!(
                    pipeline = plan.pipeline(),
                    level = level_idx,
                    "{} of {} operators failed",
                    failures.len(),
                    level.len()
                );
                return (
                    results,
                    ctx,
                    Some(PipelineError::LevelFailed {
                        level: level_idx,
                        failures,
                    }),
                );
            }

            ctx = level_ctx.merge_siblings(&contexts);
        }

        (results, ctx, None)
    }

    /// Barrier: collect every task of a level, or stop early when the
    /// request is cancelled or its deadline passes.
    async fn wait_for_level(
        &self,
        tasks: &mut JoinSet<(usize, Invocation)>,
        slots: &mut [Option<Invocation>],
        ctx: &RequestContext,
    ) -> Option<Interrupt> {
        let token = ctx.cancellation().clone();
        let deadline = ctx.deadline();

        loop {
            tokio::select! {
                biased;

                joined = tasks.join_next() => match joined {
                    None => return None,
                    Some(Ok((idx, invocation))) => slots[idx] = Some(invocation),
                    Some(Err(e)) => tracing::error!("Operator task join error: {}", e),
                },
                _ = token.cancelled() => return Some(Interrupt::Cancelled),
                _ = sleep_until(deadline) => return Some(Interrupt::DeadlineExceeded),
            }
        }
    }

    fn emit_level_started(&self, execution_id: ExecutionId, level: usize, operators: &[String]) {
        tracing::debug!("Starting level {} with {} operators", level, operators.len());
        self.events.emit(ExecutionEvent::LevelStarted {
            execution_id,
            level,
            operators: operators.to_vec(),
            timestamp: Utc::now(),
        });
    }
}

/// Collect whatever finished before an abort took effect.
async fn drain_level(tasks: &mut JoinSet<(usize, Invocation)>, slots: &mut [Option<Invocation>]) {
    while let Some(joined) = tasks.join_next().await {
        if let Ok((idx, invocation)) = joined {
            slots[idx] = Some(invocation);
        }
    }
}

fn descriptor_for(plan: &ExecutionPlan, name: &str) -> OperatorDescriptor {
    plan.descriptor(name)
        .cloned()
        .unwrap_or_else(|| OperatorDescriptor::named(name))
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// [`invoke`], with a panicking operator turned into a failed result.
async fn invoke_guarded(
    registry: Arc<OperatorRegistry>,
    events: Arc<EventBus>,
    execution_id: ExecutionId,
    level: usize,
    descriptor: OperatorDescriptor,
    ctx: RequestContext,
    input: Arc<Value>,
) -> Invocation {
    let operator = descriptor.name.clone();
    let start = Instant::now();

    AssertUnwindSafe(invoke(
        registry,
        events.clone(),
        execution_id,
        level,
        descriptor,
        ctx,
        input,
    ))
    .catch_unwind()
    .await
    .unwrap_or_else(|_| {
        tracing::error!("Operator {} panicked", operator);
        events.emit(ExecutionEvent::OperatorFailed {
            execution_id,
            operator: operator.clone(),
            error: "task panicked".to_string(),
            timestamp: Utc::now(),
        });
        Invocation::failed(ExecutionError::Panicked { operator }, start.elapsed())
    })
}

/// Resolve and run a single operator exactly once, racing it against the
/// request's cancellation token and deadline.
async fn invoke(
    registry: Arc<OperatorRegistry>,
    events: Arc<EventBus>,
    execution_id: ExecutionId,
    level: usize,
    descriptor: OperatorDescriptor,
    ctx: RequestContext,
    input: Arc<Value>,
) -> Invocation {
    let start = Instant::now();
    let name = descriptor.name.clone();

    events.emit(ExecutionEvent::OperatorStarted {
        execution_id,
        operator: name.clone(),
        level,
        timestamp: Utc::now(),
    });

    let outcome = match registry.instantiate(&descriptor) {
        Err(RegistryError::NotFound { .. }) => Err(ExecutionError::OperatorNotFound {
            operator: name.clone(),
        }),
        Err(RegistryError::Construction { source, .. }) => Err(ExecutionError::Construction {
            operator: name.clone(),
            message: source.to_string(),
        }),
        Ok(operator) => {
            let token = ctx.cancellation().clone();
            let deadline = ctx.deadline();

            tokio::select! {
                biased;

                _ = token.cancelled() => Err(ExecutionError::Cancelled {
                    operator: name.clone(),
                }),
                _ = sleep_until(deadline) => Err(ExecutionError::DeadlineExceeded {
                    operator: name.clone(),
                }),
                res = operator.execute(ctx, input.as_ref()) => res.map_err(|source| {
                    ExecutionError::Operator {
                        operator: name.clone(),
                        source,
                    }
                }),
            }
        }
    };

    let duration = start.elapsed();
    match outcome {
        Ok(output) => {
            tracing::debug!("Operator {} completed in {}ms", name, duration.as_millis());
            events.emit(ExecutionEvent::OperatorCompleted {
                execution_id,
                operator: name.clone(),
                duration_ms: duration.as_millis() as u64,
                timestamp: Utc::now(),
            });
            Invocation {
                result: ExecutionResult::succeeded(name, output.data, duration),
                context: Some(output.context),
            }
        }
        Err(error) => {
            tracing::warn!("Operator {} failed: {}", name, error);
            events.emit(ExecutionEvent::OperatorFailed {
                execution_id,
                operator: name,
                error: error.to_string(),
                timestamp: Utc::now(),
            });
            Invocation::failed(error, duration)
        }
    }
}
