//! Restore Engine - Main entry point
//!
//! Waits for one peer connection and restores (or verifies) a backup
//! generation to it.

use anyhow::{bail, Result};
use clap::Parser;
use restore_engine::restore::{Mode, RestoreFilter, RestoreSession, SessionStatus};
use restore_engine::storage::GenerationChain;
use restore_engine::{config::Config, daemon::shutdown, net, utils};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Backup number to restore (defaults to the newest generation)
    #[arg(short, long)]
    generation: Option<u64>,

    /// Only restore paths matching this regular expression
    #[arg(long)]
    regex: Option<String>,

    /// Only restore this path and everything beneath it (repeatable)
    #[arg(long = "path", value_name = "PATH")]
    paths: Vec<String>,

    /// Check content against the manifest checksums instead of sending it
    #[arg(long)]
    verify: bool,

    /// Address to listen on (overrides config)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        Ok(SessionStatus::Clean) => ExitCode::SUCCESS,
        Ok(SessionStatus::CompletedWithWarnings) => ExitCode::from(2),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<SessionStatus> {
    // Load configuration
    let config = Config::from_file(&args.config)?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting restore-engine v{} (client dir: {})",
        env!("CARGO_PKG_VERSION"),
        config.storage.client_dir.display()
    );

    let chain = GenerationChain::load(&config.storage.client_dir)?;
    let filter = RestoreFilter::new(args.regex.as_deref(), args.paths)?;
    let mode = if args.verify {
        Mode::Verify
    } else {
        Mode::Restore
    };
    let session = RestoreSession::from_config(&config, chain, args.generation, filter, mode)?;

    let addr = args.listen.unwrap_or(config.server.listen);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Waiting for peer on {}", addr);

    let (stream, remote) = tokio::select! {
        accepted = listener.accept() => accepted?,
        signalled = shutdown::wait_for_signal() => {
            signalled?;
            bail!("shutdown requested before a peer connected");
        }
    };
    tracing::info!("Peer connected from {}", remote);

    let report = net::serve_session(stream, session).await?;
    Ok(report.status())
}
