use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use rewind::render::{render_block, render_document, render_report};
use rewind::session::{LineOutcome, Session};
use rewind::snapshot::read_snapshot;
use rewind::{util, Config, ReplayEngine};

/// Record terminal sessions as blocks and replay them later
#[derive(Debug, Parser)]
#[command(name = "rewind", version)]
struct Cli {
    /// Data directory (default: ~/.rewind)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session reading command lines from stdin
    Shell,
    /// Replay a snapshot and print the rebuilt transcript
    Replay {
        path: PathBuf,
        /// Print the replayed blocks as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summarize a snapshot without running anything
    Inspect { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = util::init_data_dir(cli.data_dir.clone());

    // Initialize logging to file (~/.rewind/logs/rewind.log)
    fs::create_dir_all(util::logs_dir())?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(log_file)
        .with_ansi(false) // Disable ANSI colors in log file
        .init();

    tracing::debug!(data_dir = %data_dir.display(), "Starting rewind");

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    match cli.command.unwrap_or(Command::Shell) {
        Command::Shell => run_shell(config).await,
        Command::Replay { path, json } => run_replay(config, path, json).await,
        Command::Inspect { path } => {
            let document = read_snapshot(&path)
                .await
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
            print!("{}", render_document(&document));
            Ok(())
        }
    }
}

async fn run_shell(config: Config) -> Result<()> {
    let mut session = Session::from_config(config);
    tracing::info!(session_id = %session.id(), "Session started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("rewind> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }

        match session.run_line(&line).await {
            Ok(LineOutcome::Empty) => {}
            Ok(LineOutcome::Executed(block)) => print!("{}", render_block(&block)),
            Ok(LineOutcome::Snapshot(written)) => println!(
                "Wrote {} block{} to {} ({}{})",
                written.blocks,
                if written.blocks == 1 { "" } else { "s" },
                written.path.display(),
                written.mode,
                if written.scrubbed { ", scrubbed" } else { "" }
            ),
            Ok(LineOutcome::Replayed(report)) => print!("{}", render_report(&report)),
            Err(e) => eprintln!("{}", e),
        }
    }

    tracing::info!(
        session_id = %session.id(),
        blocks = session.store().len(),
        "Session ended"
    );
    Ok(())
}

async fn run_replay(config: Config, path: PathBuf, json: bool) -> Result<()> {
    let session = Session::from_config(config);
    let cancel = CancellationToken::new();

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let engine = ReplayEngine::new(session.dispatcher())
        .with_policy(session.config().reconciliation_policy())
        .with_cancellation(cancel);
    let report = engine
        .replay_file(&path)
        .await
        .with_context(|| format!("Failed to replay {}", path.display()))?;

    if json {
        let value = serde_json::json!({
            "mode": report.mode,
            "expected": report.expected,
            "cancelled": report.cancelled,
            "blocks": report.blocks,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print!("{}", render_report(&report));
    }
    Ok(())
}
