// crates/pipecli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pipecore::{ExecutionEvent, PipelineConfig, PipelineDefinition, RequestContext, Value};
use piperuntime::{ExecutionPlan, OperatorRegistry, PipelineRuntime, RuntimeConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pipeline")]
#[command(about = "Request pipeline CLI", long_about = None)]
struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one pipeline from a definition file
    Run {
        /// Path to pipeline JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Name of the pipeline to run
        #[arg(short, long)]
        pipeline: String,

        /// Request input as JSON string
        #[arg(short, long)]
        input: Option<String>,

        /// Run each level's operators concurrently
        #[arg(long)]
        parallel: bool,

        /// Per-request deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Validate a pipeline file
    Validate {
        /// Path to pipeline JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the execution levels of pipelines in a file
    Levels {
        /// Path to pipeline JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Only show this pipeline
        #[arg(short, long)]
        pipeline: Option<String>,
    },

    /// List available operator types
    Operators,

    /// Create an example pipeline file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            file,
            pipeline,
            input,
            parallel,
            timeout_ms,
        } => {
            run_pipeline(&file, &pipeline, input, parallel, timeout_ms).await?;
        }

        Commands::Validate { file } => {
            validate_file(&file)?;
        }

        Commands::Levels { file, pipeline } => {
            print_levels(&file, pipeline.as_deref())?;
        }

        Commands::Operators => {
            list_operators();
        }

        Commands::Init { output } => {
            create_example_pipeline(&output)?;
        }
    }

    Ok(())
}

fn standard_registry() -> Arc<OperatorRegistry> {
    let registry = OperatorRegistry::new();
    pipeops::register_all(&registry);
    Arc::new(registry)
}

fn parse_input(input: Option<String>) -> Result<Value> {
    match input {
        Some(raw) => {
            let json: serde_json::Value =
                serde_json::from_str(&raw).context("Input must be valid JSON")?;
            Ok(Value::from(json))
        }
        None => Ok(Value::object()),
    }
}

async fn run_pipeline(
    file: &Path,
    name: &str,
    input: Option<String>,
    parallel: bool,
    timeout_ms: Option<u64>,
) -> Result<()> {
    println!("🚀 Loading pipelines from: {}", file.display());

    let input = parse_input(input)?;
    let runtime = PipelineRuntime::with_registry(standard_registry(), RuntimeConfig::from_env());
    let loaded = runtime.load_file(file)?;
    println!("📋 Loaded {} pipeline(s)", loaded);
    println!();

    let mut events = runtime.subscribe_events();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::PipelineStarted {
                    pipeline, parallel, ..
                } => {
                    let mode = if parallel { "parallel" } else { "sequential" };
                    println!("▶️  Pipeline {} started ({})", pipeline, mode);
                }
                ExecutionEvent::LevelStarted {
                    level, operators, ..
                } => {
                    println!("  📶 Level {}: {}", level, operators.join(", "));
                }
                ExecutionEvent::OperatorStarted { operator, .. } => {
                    println!("    ⚡ Starting operator: {}", operator);
                }
                ExecutionEvent::OperatorCompleted {
                    operator,
                    duration_ms,
                    ..
                } => {
                    println!("    ✅ Operator {} completed in {}ms", operator, duration_ms);
                }
                ExecutionEvent::OperatorFailed {
                    operator, error, ..
                } => {
                    println!("    ❌ Operator {} failed: {}", operator, error);
                }
                ExecutionEvent::PipelineCompleted {
                    success,
                    attempted,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!(
                            "✨ Pipeline completed successfully in {}ms ({} operators)",
                            duration_ms, attempted
                        );
                    } else {
                        println!(
                            "💥 Pipeline failed after {}ms ({} operators attempted)",
                            duration_ms, attempted
                        );
                    }
                }
            }
        }
    });

    let mut options = runtime.options(input);
    if parallel {
        options = options.parallel(true);
    }
    if let Some(ms) = timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }

    let outcome = runtime.execute(RequestContext::new(), name, options).await?;

    // Wait for events to finish printing
    tokio::time::sleep(Duration::from_millis(100)).await;
    event_task.abort();

    let response = outcome.response();

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", outcome.execution_id);
    println!("   Attempted: {}", outcome.results.len());
    println!("   Status: {}", response.status);
    println!();
    println!("📤 Response:");
    println!("{}", serde_json::to_string_pretty(&response)?);

    if let Some(error) = outcome.error {
        return Err(error.into());
    }

    Ok(())
}

fn validate_file(file: &Path) -> Result<()> {
    println!("🔍 Validating pipelines: {}", file.display());

    let config = PipelineConfig::from_file(file)?;
    let registry = standard_registry();

    let mut invalid = 0;
    for definition in &config.pipelines {
        match ExecutionPlan::build(definition, &registry) {
            Ok(plan) => println!(
                "✅ {}: {} operators in {} levels",
                definition.name,
                plan.operator_count(),
                plan.levels().len()
            ),
            Err(e) => {
                invalid += 1;
                println!("❌ {}: {}", definition.name, e);
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} pipelines are invalid", invalid, config.pipelines.len());
    }

    Ok(())
}

fn print_levels(file: &Path, only: Option<&str>) -> Result<()> {
    let config = PipelineConfig::from_file(file)?;
    let registry = standard_registry();

    let definitions: Vec<&PipelineDefinition> = match only {
        Some(name) => vec![config
            .get(name)
            .with_context(|| format!("No pipeline named '{}' in {}", name, file.display()))?],
        None => config.pipelines.iter().collect(),
    };

    for definition in definitions {
        let plan = ExecutionPlan::build(definition, &registry)?;
        println!("📋 {}", plan.pipeline());
        for (idx, level) in plan.levels().iter().enumerate() {
            println!("   {}: {}", idx, level.join(", "));
        }
    }

    Ok(())
}

fn list_operators() {
    println!("📦 Available Operator Types:");
    println!();

    let registry = standard_registry();

    for operator_type in registry.list_operators() {
        if let Some(metadata) = registry.get_metadata(&operator_type) {
            println!("  • {} ({})", operator_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", operator_type);
        }
    }
}

fn create_example_pipeline(output: &Path) -> Result<()> {
    let mut validate_config = HashMap::new();
    validate_config.insert(
        "required".to_string(),
        Value::Array(vec![Value::from("user")]),
    );

    let login = PipelineDefinition::new("login")
        .with_operator("validate", "request.validate", validate_config)
        .with_operator("auth", "auth.identity", HashMap::new())
        .with_operator("log", "debug.log", HashMap::new())
        .with_operator("respond", "respond", HashMap::new())
        .depends_on("auth", ["validate"])
        .depends_on("log", ["validate"])
        .depends_on("respond", ["auth", "log"]);

    let config = PipelineConfig {
        pipelines: vec![login],
    };

    std::fs::write(output, config.to_json_pretty()?)?;

    println!("✨ Created example pipeline: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  pipeline run --file {} --pipeline login --input '{{\"user\": \"ada\"}}'",
        output.display()
    );

    Ok(())
}
