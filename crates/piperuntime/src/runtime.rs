use crate::executor::{ExecuteOptions, PipelineExecutor, PipelineOutcome};
use crate::levels::ExecutionPlan;
use crate::registry::OperatorRegistry;
use parking_lot::RwLock;
use pipecore::{
    ConfigError, EventBus, ExecutionEvent, GraphError, PipelineConfig, PipelineDefinition,
    PipelineError, RequestContext, Value,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Failure while loading pipeline definitions
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Main runtime: owns the registry and the cached plan of every loaded pipeline
pub struct PipelineRuntime {
    registry: Arc<OperatorRegistry>,
    executor: PipelineExecutor,
    event_bus: Arc<EventBus>,
    plans: RwLock<HashMap<String, Arc<ExecutionPlan>>>,
    config: RuntimeConfig,
}

impl PipelineRuntime {
    /// Create a new runtime with default settings
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a new runtime with custom configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_registry(Arc::new(OperatorRegistry::new()), config)
    }

    /// Create a new runtime with a pre-configured registry
    pub fn with_registry(registry: Arc<OperatorRegistry>, config: RuntimeConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let executor = PipelineExecutor::new(registry.clone(), event_bus.clone());

        Self {
            registry,
            executor,
            event_bus,
            plans: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get access to the operator registry for registering operators
    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    /// Validate, level and cache a pipeline. A pipeline that fails to build
    /// is not registered; a previously loaded plan under the same name is kept.
    pub fn load_pipeline(
        &self,
        definition: &PipelineDefinition,
    ) -> Result<Arc<ExecutionPlan>, GraphError> {
        let plan = Arc::new(ExecutionPlan::build(definition, &self.registry)?);

        tracing::info!(
            pipeline = %definition.name,
            levels = plan.levels().len(),
            operators = plan.operator_count(),
            "Loaded pipeline"
        );

        self.plans
            .write()
            .insert(definition.name.clone(), plan.clone());
        Ok(plan)
    }

    /// Load every pipeline of a config, stopping at the first failure.
    pub fn load_config(&self, config: &PipelineConfig) -> Result<usize, GraphError> {
        for definition in &config.pipelines {
            self.load_pipeline(definition).map_err(|e| {
                tracing::error!("Failed to load pipeline {}: {}", definition.name, e);
                e
            })?;
        }
        Ok(config.pipelines.len())
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<usize, LoadError> {
        let config = PipelineConfig::from_file(path)?;
        Ok(self.load_config(&config)?)
    }

    pub fn plan(&self, name: &str) -> Option<Arc<ExecutionPlan>> {
        self.plans.read().get(name).cloned()
    }

    /// Names of every loaded pipeline, sorted
    pub fn pipelines(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plans.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Options carrying this runtime's configured defaults
    pub fn options(&self, input: impl Into<Value>) -> ExecuteOptions {
        ExecuteOptions {
            parallel: self.config.parallel,
            timeout: self.config.default_timeout,
            input: input.into(),
        }
    }

    /// Execute a loaded pipeline for one request.
    ///
    /// `Err` only when no pipeline is loaded under `name`; operator
    /// failures are reported on the returned outcome.
    pub async fn execute(
        &self,
        ctx: RequestContext,
        name: &str,
        mut options: ExecuteOptions,
    ) -> Result<PipelineOutcome, PipelineError> {
        let plan = self.plan(name).ok_or_else(|| PipelineError::NotFound {
            pipeline: name.to_string(),
        })?;

        if options.timeout.is_none() {
            options.timeout = self.config.default_timeout;
        }

        Ok(self.executor.execute(&plan, ctx, options).await)
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }
}

impl Default for PipelineRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    /// Default execution mode for [`PipelineRuntime::options`].
    pub parallel: bool,
    /// Applied when a request sets no timeout of its own.
    pub default_timeout: Option<Duration>,
}

impl RuntimeConfig {
    /// Defaults overridden by `PIPELINE_EVENT_BUFFER`, `PIPELINE_PARALLEL`
    /// and `PIPELINE_TIMEOUT_MS`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup("PIPELINE_EVENT_BUFFER") {
            match raw.parse() {
                Ok(size) => config.event_buffer_size = size,
                Err(_) => tracing::warn!("Ignoring invalid PIPELINE_EVENT_BUFFER: {}", raw),
            }
        }
        if let Some(raw) = lookup("PIPELINE_PARALLEL") {
            match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.parallel = true,
                "0" | "false" | "no" => config.parallel = false,
                _ => tracing::warn!("Ignoring invalid PIPELINE_PARALLEL: {}", raw),
            }
        }
        if let Some(raw) = lookup("PIPELINE_TIMEOUT_MS") {
            match raw.parse::<u64>() {
                Ok(0) => config.default_timeout = None,
                Ok(ms) => config.default_timeout = Some(Duration::from_millis(ms)),
                Err(_) => tracing::warn!("Ignoring invalid PIPELINE_TIMEOUT_MS: {}", raw),
            }
        }

        config
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
            parallel: false,
            default_timeout: None,
        }
    }
}
