//! Swarmforge binary entry point
//!
//! Loads configuration, builds the orchestrator, and runs a single request
//! to completion while streaming status events to the terminal.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;
use swarmforge_common::{ExecutionStatus, SystemConfig};
use swarmforge_orchestration::status_stream::StatusEventType;
use swarmforge_orchestration::{tracing_setup, Orchestrator, VERSION};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "swarmforge")]
#[command(version = VERSION)]
#[command(about = "Multi-agent task orchestration engine")]
struct Cli {
    /// Path to configuration file; the built-in roster is used when absent
    #[arg(short, long, default_value = "swarmforge.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose a request and execute the resulting workflow
    Execute {
        /// The request to process
        prompt: String,
    },
    /// Validate configuration and list the agent roster
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.as_deref().unwrap_or("info");
    tracing_setup::init_tracing_with_level(log_level)?;

    info!("Swarmforge v{} starting", VERSION);

    let config = if Path::new(&cli.config).exists() {
        SystemConfig::from_file(&cli.config).map_err(|e| {
            error!("Failed to load configuration: {}", e);
            e
        })?
    } else {
        info!("No configuration file at {}; using defaults", cli.config);
        SystemConfig::default()
    };

    match cli.command {
        Commands::ValidateConfig => {
            config.validate()?;
            println!("✓ Configuration is valid");
            println!("  Concurrency limit: {}", config.orchestration.max_concurrent_tasks);
            println!("  Agents: {}", config.roster.len());
            for spec in &config.roster {
                println!(
                    "  - {} ({}): {}",
                    spec.name,
                    spec.agent_type,
                    spec.capabilities.join(", ")
                );
            }
            Ok(())
        }
        Commands::Execute { prompt } => execute_request(config, &prompt).await,
    }
}

/// Run one request to a terminal state and print the task table
async fn execute_request(config: SystemConfig, prompt: &str) -> Result<()> {
    info!("Processing request: {}", prompt);

    let orchestrator = Orchestrator::new(config).await?;
    let mut events = orchestrator.status_stream().subscribe();

    let execution_id = orchestrator.process_request(prompt).await?;
    println!("Execution {} started", execution_id);

    loop {
        match events.recv().await {
            Ok(event) if event.execution_id == execution_id => {
                println!("[{}] {}", event.event_type, event.message);
                if matches!(
                    event.event_type,
                    StatusEventType::ExecutionCompleted | StatusEventType::ExecutionFailed
                ) {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                error!("Status stream closed: {}", e);
                break;
            }
        }
    }

    let execution = orchestrator.get_execution(execution_id).await?;
    println!();
    println!(
        "Status: {} ({:.0}% complete, {} phases)",
        execution.status,
        execution.progress * 100.0,
        execution.phases.len()
    );
    if let Some(error) = &execution.error {
        println!("Error: {}", error);
    }

    println!();
    for task in orchestrator.get_tasks(execution_id).await {
        println!(
            "  [{}] {} ({}) agent={}",
            task.status,
            task.description,
            task.task_type,
            task.assigned_agent
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    if execution.status == ExecutionStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
