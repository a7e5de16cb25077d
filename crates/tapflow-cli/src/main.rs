use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tapflow_engine::{ExecutorCommand, ExecutorEvent, FlowExecutor, NullBackend};
use tapflow_schema::{Flow, ParseError};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tapflow", about = "Validate and dry-run automation flow files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a flow file and report every validation error
    Validate {
        /// Path to a flow JSON file
        file: PathBuf,
    },
    /// Print a summary of a valid flow
    Inspect {
        /// Path to a flow JSON file
        file: PathBuf,
    },
    /// Replay a flow against the no-op input backend
    Run {
        /// Path to a flow JSON file
        file: PathBuf,

        /// Overall deadline in seconds
        #[arg(long, default_value_t = 600)]
        deadline: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate { file } => validate(&file),
        Command::Inspect { file } => inspect(&file),
        Command::Run { file, deadline } => run(&file, deadline).await,
    }
}

fn load(file: &Path) -> Result<Flow> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    match Flow::from_json(&json) {
        Ok(flow) => Ok(flow),
        Err(ParseError::Json(e)) => Err(e).context(format!("{} is not valid JSON", file.display())),
        Err(ParseError::Validation(errors)) => {
            eprintln!("{} failed validation:", file.display());
            for err in errors.iter() {
                eprintln!("  {err}");
            }
            bail!("{} validation error(s)", errors.len());
        }
    }
}

fn validate(file: &Path) -> Result<()> {
    let flow = load(file)?;
    println!(
        "{}: ok ({} nodes, {} edges)",
        file.display(),
        flow.nodes.len(),
        flow.edges.len()
    );
    Ok(())
}

fn inspect(file: &Path) -> Result<()> {
    let flow = load(file)?;
    let meta = &flow.metadata;
    println!("flow:     {}", meta.name.as_deref().unwrap_or("(unnamed)"));
    println!("version:  {}", meta.version);
    println!("modified: {}", meta.modified);
    println!("nodes:");
    for node in &flow.nodes {
        println!(
            "  {}  {:<12} {}",
            node.id,
            node.kind().display_name(),
            node.metadata.label
        );
    }
    println!("edges:");
    for edge in &flow.edges {
        println!("  {} -> {}", edge.source, edge.target);
    }
    Ok(())
}

async fn run(file: &Path, deadline: u64) -> Result<()> {
    let flow = load(file)?;

    let (event_tx, mut event_rx) = mpsc::channel(256);
    let (command_tx, command_rx) = mpsc::channel(8);

    // Ctrl-C requests a cooperative stop rather than killing the run.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = command_tx.send(ExecutorCommand::Stop).await;
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ExecutorEvent::Log(msg) => println!("  {msg}"),
                ExecutorEvent::NodeStarted(id) => println!("node started   {id}"),
                ExecutorEvent::NodeCompleted(id) => println!("node completed {id}"),
                ExecutorEvent::NodeFailed(id, error) => {
                    println!("node failed    {id}: {error}")
                }
                ExecutorEvent::StateChanged(state) => println!("state: {state:?}"),
                ExecutorEvent::FlowCompleted => println!("flow completed"),
                ExecutorEvent::FlowStopped => println!("flow stopped"),
                ExecutorEvent::FlowTimedOut => println!("flow timed out"),
            }
        }
    });

    let outcome = FlowExecutor::new(flow, NullBackend, event_tx)
        .with_deadline(Duration::from_secs(deadline))
        .run(command_rx)
        .await?;
    printer.await?;

    println!("outcome: {outcome:?}");
    Ok(())
}
