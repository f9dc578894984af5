use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;

use cli::Cli;
use cli::commands::{Commands, RunArgs};
use refinr::config::Config;
use refinr::domain::{LoopState, RunEvent, RunEventKind, RunInputs};
use refinr::llm::{AnthropicClient, LlmClient};
use refinr::runner::{LogObserver, RunObserver};

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("refinr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("refinr.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    env_logger::Builder::new()
        .parse_filters(level.unwrap_or("info"))
        .parse_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Prints stage progress to the terminal and forwards to the log
struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn on_event(&self, event: &RunEvent) {
        LogObserver.on_event(event);
        match &event.kind {
            RunEventKind::StageEntered { stage, iteration } => {
                println!("{} {} (iteration {})", "->".cyan(), stage, iteration);
            }
            RunEventKind::StageRetried { stage, attempt, reason } => {
                println!(
                    "{} retrying {} (attempt {}): {}",
                    "!".yellow(),
                    stage,
                    attempt,
                    reason
                );
            }
            RunEventKind::Decided { decision, score, .. } => {
                let score = score.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
                println!("   score {}/10, {}", score, decision);
            }
            _ => {}
        }
    }
}

fn print_state(state: &LoopState) {
    println!("{}", "Initial artifact:".bold());
    println!("{}\n", state.initial_artifact);
    println!("{} {}\n", "Goal:".bold(), state.goal);
    println!("{}", "Final artifact:".green().bold());
    println!("{}\n", state.artifact);

    match &state.evaluation {
        Some(evaluation) => {
            let score = format!("{}/10", evaluation.score());
            let score = if evaluation.is_improvement_sufficient() {
                score.green()
            } else {
                score.yellow()
            };
            println!("{} {}", "Score:".bold(), score);
            println!("{} {}", "Sufficient:".bold(), evaluation.is_improvement_sufficient());
            println!("{} {}", "Rationale:".bold(), evaluation.rationale());
        }
        None => println!("{}", "No evaluation was produced".yellow()),
    }
    println!("{} {}/{}", "Iterations:".bold(), state.iteration_count, state.max_iterations);
}

async fn handle_run_command(args: &RunArgs, cli: &Cli, config: &Config) -> Result<()> {
    let artifact = args.artifact_text()?;
    let max_iterations = args.max_iterations.unwrap_or(config.refine.max_iterations);
    let inputs = RunInputs::new(artifact, args.goal.clone()).with_max_iterations(max_iterations);
    info!("Refining toward goal: {} (budget {})", inputs.goal, max_iterations);

    let client = Arc::new(
        AnthropicClient::new(config.anthropic()).context("Failed to create LLM client")?,
    );
    info!("Using model {}", client.model());
    let observer: Arc<dyn RunObserver> = if cli.is_verbose() {
        Arc::new(ConsoleObserver)
    } else {
        Arc::new(LogObserver)
    };
    let llm: Arc<dyn LlmClient> = client.clone();
    let controller = config.controller(llm)?.with_observer(observer);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    let result = controller.run(inputs, &cancel).await;
    let usage = client.total_usage();
    info!(
        "Token usage: {} input, {} output, {} total",
        usage.input_tokens,
        usage.output_tokens,
        usage.total()
    );
    if cli.is_verbose() {
        println!(
            "{} {} input, {} output ({})",
            "Tokens:".bold(),
            usage.input_tokens,
            usage.output_tokens,
            client.model()
        );
    }

    match result {
        Ok(outcome) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&outcome.state)?);
            } else {
                print_state(&outcome.state);
                println!("{} {}", "Stopped:".bold(), outcome.stop_reason);
            }
            Ok(())
        }
        Err(aborted) => {
            eprintln!("{} {}", "Run aborted:".red().bold(), aborted.error);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&aborted.state)?);
            } else if aborted.state.iteration_count > 0 {
                print_state(&aborted.state);
            }
            Err(aborted).context("Refinement failed")
        }
    }
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    match &cli.command {
        Commands::Run(args) => handle_run_command(args, cli, config).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging at the configured level
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
