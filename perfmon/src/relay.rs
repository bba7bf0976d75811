//! perfmon-relay - feeds request events from stdin into a collector
//!
//! Each input line describes one completed request:
//!
//! ```text
//! {"payload": {"controller": "PostsController", ...}, "start": "2015-04-29T12:00:00Z", "finish": "2015-04-29T12:00:02Z"}
//! ```
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/perfmon/config.toml (~/.config/perfmon/config.toml)
//! - Logs: $XDG_STATE_HOME/perfmon/perfmon.log (~/.local/state/perfmon/perfmon.log)

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use perfmon_core::collector::RequestCollector;
use perfmon_core::{Config, RequestPayload, SslVerifyMode};
use serde::Deserialize;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "perfmon-relay")]
#[command(about = "Relay request performance events to an ingestion endpoint")]
#[command(version)]
struct Args {
    /// Config file (default: $XDG_CONFIG_HOME/perfmon/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Read events from stdin until EOF or Ctrl-C (default)
    Run,

    /// Show collector configuration
    Status,
}

/// One input line
#[derive(Debug, Deserialize)]
struct EventLine {
    payload: RequestPayload,
    start: DateTime<Utc>,
    finish: DateTime<Utc>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    match args.command.unwrap_or(Command::Run) {
        Command::Status => cmd_status(&config, args.config.as_ref()),
        Command::Run => cmd_run(config).await,
    }
}

fn cmd_status(config: &Config, path: Option<&PathBuf>) -> Result<()> {
    let collector = &config.collector;
    let path = path.cloned().unwrap_or_else(Config::config_path);

    println!("perfmon Collector Configuration");
    println!("===============================");
    println!();
    println!("Config File:     {}", path.display());
    println!(
        "Service URL:     {}",
        collector.service_url.as_deref().unwrap_or("<not set>")
    );
    println!(
        "API Key:         {}",
        if collector.credential().is_empty() {
            "<not set>"
        } else {
            "<set>"
        }
    );
    println!(
        "SSL Verify:      {}",
        match collector.ssl_verify_mode {
            SslVerifyMode::Peer => "peer",
            SslVerifyMode::None => "none",
        }
    );
    println!("Flush Interval:  {}s", collector.flush_interval_secs);
    println!("Connect Timeout: {}s", collector.connect_timeout_secs);

    println!();
    if collector.is_ready() {
        println!("Status: Ready to collect");
    } else {
        println!("Status: Dormant (service_url and api_key are required)");
    }

    Ok(())
}

async fn cmd_run(config: Config) -> Result<()> {
    let _log_guard =
        perfmon_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let collector =
        RequestCollector::activate(config.collector).context("failed to create collector")?;
    if collector.is_none() {
        tracing::info!("Collector not configured, discarding input");
    }

    let mut lines = spawn_stdin_reader();
    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                None
            }
        };
        let Some(line) = line else { break };

        let Some(collector) = &collector else {
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<EventLine>(&line) {
            Ok(event) => collector.on_event(&event.payload, event.start, event.finish),
            Err(e) => tracing::warn!(error = %e, "Skipping malformed event line"),
        }
    }

    if let Some(collector) = collector {
        collector.shutdown().await;
        let stats = collector.stats();
        tracing::info!(
            attempts = stats.attempts,
            events_sent = stats.events_sent,
            pending = collector.pending_count(),
            "Collector stopped"
        );
    }

    Ok(())
}

/// Read stdin lines on a detached thread
///
/// A blocked read never holds up shutdown: the runtime does not wait for
/// this thread. The channel closes on EOF or on the first read error.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read stdin");
                    break;
                }
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
