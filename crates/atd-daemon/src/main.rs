//! atd-daemon - watches agent team state and streams change events
//!
//! Runs the watch service over `~/.claude/teams` and `~/.claude/tasks` and
//! prints the initial snapshot plus every subsequent broadcast event as one
//! JSON line on stdout, until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use atd_core::config::WatchConfig;
use atd_daemon::service::{ChangeKind, StateEvent, WatchService};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// atd-daemon - watches agent team state and streams change events
#[derive(Parser, Debug)]
#[command(name = "atd-daemon")]
#[command(about = "Watches agent team state and streams change events as JSON lines")]
#[command(version)]
struct Args {
    /// Root of the watched tree (default: ~/.claude)
    #[arg(long, value_name = "PATH")]
    claude_root: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        atd_core::logging::init_with_level(tracing::Level::DEBUG);
    } else {
        atd_core::logging::init();
    }

    info!("atd-daemon starting...");

    let home_dir = atd_core::home::get_home_dir().context("Failed to determine home directory")?;

    let config = WatchConfig::load(args.config.as_deref(), &home_dir)
        .context("Failed to load configuration")?;

    let claude_root = match args.claude_root {
        Some(root) => root,
        None => home_dir.join(".claude"),
    };
    info!("Claude root: {}", claude_root.display());

    let store = atd_core::new_shared_store();
    let mut service = WatchService::new(store, &claude_root, config);

    // Set up signal handlers
    let cancel_token = CancellationToken::new();
    let cancel_for_signals = cancel_token.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to create SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received SIGINT (Ctrl+C)");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("Failed to listen for Ctrl+C");
            info!("Received Ctrl+C");
        }

        cancel_for_signals.cancel();
    });

    service.start().await.context("Failed to start watch service")?;

    // A new observer always gets a complete baseline before incremental
    // events: the full team list, then every known task.
    let mut subscription = service.subscribe();
    print_event(&StateEvent::TeamsSnapshot(subscription.teams.clone()))?;
    for task in subscription.tasks.drain(..) {
        print_event(&StateEvent::TaskChanged {
            task,
            event_kind: ChangeKind::Add,
        })?;
    }

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            received = subscription.events.recv() => match received {
                Ok(event) => print_event(&event)?,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Observer lagged; {missed} event(s) skipped");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    service.stop().await.context("Failed to stop watch service")?;
    info!("atd-daemon shutdown complete");
    Ok(())
}

fn print_event(event: &StateEvent) -> Result<()> {
    let line = serde_json::to_string(event).context("Failed to serialize event")?;
    println!("{line}");
    Ok(())
}
