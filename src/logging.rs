//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! Two modes:
//! - **Production** ([`init_production`]): JSON file layer (daily rotation) + console layer
//! - **CLI** ([`init_cli`]): console-only for one-shot subcommands
//!
//! Console output always goes to stderr; stdout belongs to the console
//! transport.
//!
//! Filter directives come from `MODWATCH_LOG`, then `RUST_LOG`, then
//! [`DEFAULT_DIRECTIVES`], which keeps dependencies quiet and this crate at
//! `info`.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Directives used when neither `MODWATCH_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_DIRECTIVES: &str = "warn,modwatch=info";

/// Pick filter directives: `MODWATCH_LOG` > `RUST_LOG` > defaults.
///
/// Blank values are skipped. Takes a resolver so tests never touch the
/// process environment.
pub fn filter_directives(env: impl Fn(&str) -> Option<String>) -> String {
    ["MODWATCH_LOG", "RUST_LOG"]
        .into_iter()
        .filter_map(&env)
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVES.to_owned())
}

/// Build the filter, falling back to defaults on unparsable directives.
fn env_filter() -> EnvFilter {
    let directives = filter_directives(|key| std::env::var(key).ok());
    EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("modwatch: ignoring invalid log filter {directives:?}: {e}");
        EnvFilter::new(DEFAULT_DIRECTIVES)
    })
}

/// Holds the non-blocking writer guard for file logging.
///
/// The [`WorkerGuard`] must be kept alive for the duration of the process.
/// Dropping it flushes pending log entries and closes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Initialise logging for the `run` subcommand (production mode).
///
/// Writes JSON logs to `{logs_dir}/modwatch.log.YYYY-MM-DD` with daily
/// rotation. Also emits human-readable output to stderr. Both layers share
/// the filter chosen by [`filter_directives`].
///
/// Returns a [`LoggingGuard`] that must be kept alive for log flushing.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created.
pub fn init_production(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "modwatch.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = env_filter();

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_writer(non_blocking);

    let console_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(console_layer)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    Ok(LoggingGuard { _guard: guard })
}

/// Initialise minimal logging for one-shot subcommands like `check-config`.
///
/// Emits human-readable output to stderr only. No file rotation.
pub fn init_cli() {
    let env_filter = env_filter();

    // A second init in the same process keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}
