//! ModWatch CLI entry point.
//!
//! Provides `run` and `check-config` subcommands for running the engine over
//! the console transport or validating configuration.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::{info, warn};

use modwatch::adapters::console;
use modwatch::audit::{AuditSource, InMemoryPlatform, MembershipSource};
use modwatch::config::BotConfig;
use modwatch::context::ModContext;
use modwatch::notifier::ChannelNotifier;
use modwatch::stats::rollover;

/// Outbound notifications buffered between the engine and stdout.
const OUTBOUND_CAPACITY: usize = 256;

/// ModWatch: moderator duty tracking and audit-trail attribution.
#[derive(Parser)]
#[command(name = "modwatch", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the engine, reading JSON-line events from stdin.
    Run,
    /// Load and validate configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match cli.command {
        Command::Run => handle_run().await,
        Command::CheckConfig => handle_check_config(),
    }
}

/// Run the engine until stdin closes or Ctrl-C.
async fn handle_run() -> anyhow::Result<()> {
    let config = BotConfig::load().context("failed to load configuration")?;
    let _logging_guard = modwatch::logging::init_production(&config.logs_dir()?)?;

    let platform = Arc::new(InMemoryPlatform::new());
    let (notifier, outbound_rx) = ChannelNotifier::new(OUTBOUND_CAPACITY);
    let audit: Arc<dyn AuditSource> = platform.clone();
    let members: Arc<dyn MembershipSource> = platform.clone();
    let ctx = Arc::new(ModContext::new(&config, audit, members, Arc::new(notifier)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let rollover_task = tokio::spawn(rollover::run(ctx.rollover_deps(&config)?, shutdown_rx));

    info!(
        workspaces = config.workspaces.len(),
        reminders_enabled = config.bot.reminders_enabled,
        prefix = %config.bot.command_prefix,
        "modwatch started"
    );

    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    tokio::select! {
        result = console::run(Arc::clone(&ctx), platform, stdin, stdout, outbound_rx) => {
            if let Err(e) = result {
                warn!(error = %e, "console transport stopped with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Err(e) = rollover_task.await {
        warn!(error = %e, "rollover task failed");
    }

    info!(
        active_sessions = ctx.registry.active_count(),
        "modwatch stopped"
    );
    Ok(())
}

/// Validate configuration and print a summary.
fn handle_check_config() -> anyhow::Result<()> {
    modwatch::logging::init_cli();

    let config = BotConfig::load().context("configuration is invalid")?;
    info!(
        workspaces = config.workspaces.len(),
        prefix = %config.bot.command_prefix,
        reminder_interval_secs = config.defaults.reminder_interval_secs,
        confirmation_window_secs = config.defaults.confirmation_window_secs,
        correlation_window_ms = config.defaults.correlation_window_ms,
        "configuration ok"
    );
    Ok(())
}
