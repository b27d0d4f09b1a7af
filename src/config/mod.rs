//! Configuration loading and management.
//!
//! Loads process configuration from `~/.modwatch/config.toml` (or
//! `$MODWATCH_CONFIG_PATH`). Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.
//!
//! Per-workspace settings live in [`workspace::ConfigStore`], seeded from the
//! `[[workspaces]]` tables here and mutated afterwards by setup commands.

pub mod workspace;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::types::{ChannelId, RoleId, WorkspaceId};

pub use workspace::{ConfigStore, WorkspaceConfig};

// ── Top-level config ────────────────────────────────────────────

/// Top-level process configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Command surface and global toggles (`[bot]`).
    pub bot: BotSection,
    /// Timing defaults applied to every workspace (`[defaults]`).
    pub defaults: TimingDefaults,
    /// Stats rollover schedule (`[rollover]`).
    pub rollover: RolloverConfig,
    /// Filesystem paths (`[paths]`).
    pub paths: PathsConfig,
    /// Workspaces configured ahead of time (`[[workspaces]]`).
    pub workspaces: Vec<WorkspaceSeed>,
}

impl BotConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// If the file does not exist, defaults are used.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration fails validation.
    pub fn load() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok())?;
        let mut config = Self::load_from_path(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides.
    ///
    /// A missing file yields [`BotConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                toml::from_str(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve the config file path using a custom env resolver.
    ///
    /// Checks `$MODWATCH_CONFIG_PATH` first, then `config.toml` in
    /// [`config_dir`].
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
        if let Some(p) = env("MODWATCH_CONFIG_PATH") {
            return Ok(PathBuf::from(p));
        }
        Ok(config_dir()?.join("config.toml"))
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests never touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("MODWATCH_COMMAND_PREFIX") {
            self.bot.command_prefix = v;
        }
        if let Some(v) = env("MODWATCH_REMINDERS_ENABLED") {
            match v.parse() {
                Ok(b) => self.bot.reminders_enabled = b,
                Err(_) => tracing::warn!(
                    var = "MODWATCH_REMINDERS_ENABLED",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("MODWATCH_LOG_DIR") {
            self.paths.logs_dir = Some(PathBuf::from(v));
        }
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.bot.command_prefix.trim().is_empty() {
            anyhow::bail!("bot.command_prefix must not be empty");
        }
        if self.defaults.reminder_interval_secs == 0 {
            anyhow::bail!("defaults.reminder_interval_secs must be positive");
        }
        if self.defaults.confirmation_window_secs == 0 {
            anyhow::bail!("defaults.confirmation_window_secs must be positive");
        }
        if self.defaults.correlation_window_ms == 0 {
            anyhow::bail!("defaults.correlation_window_ms must be positive");
        }
        if self.defaults.audit_fetch_limit == 0 {
            anyhow::bail!("defaults.audit_fetch_limit must be positive");
        }
        for seed in &self.workspaces {
            seed.validate()?;
        }
        if self.rollover.tick_secs == 0 {
            anyhow::bail!("rollover.tick_secs must be positive");
        }
        for (name, expr) in [
            ("daily_cron", &self.rollover.daily_cron),
            ("weekly_cron", &self.rollover.weekly_cron),
            ("monthly_cron", &self.rollover.monthly_cron),
        ] {
            cron::Schedule::from_str(expr)
                .with_context(|| format!("rollover.{name} is not a valid cron expression"))?;
        }
        Ok(())
    }

    /// Directory for JSON log files (`paths.logs_dir` or `~/.modwatch/logs`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn logs_dir(&self) -> Result<PathBuf> {
        match &self.paths.logs_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(config_dir()?.join("logs")),
        }
    }
}

/// Command surface and global toggles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotSection {
    /// Prefix that marks a chat message as a command.
    pub command_prefix: String,
    /// Operator switch for liveness probes. Existing sessions are unaffected.
    pub reminders_enabled: bool,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            command_prefix: "!".to_owned(),
            reminders_enabled: true,
        }
    }
}

/// Timing defaults for workspaces that do not override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingDefaults {
    /// Delay between liveness probes.
    pub reminder_interval_secs: u64,
    /// How long a probed moderator has to acknowledge.
    pub confirmation_window_secs: u64,
    /// Maximum distance between an event and its audit entry.
    pub correlation_window_ms: u64,
    /// Number of recent audit entries fetched per correlation.
    pub audit_fetch_limit: usize,
}

impl Default for TimingDefaults {
    fn default() -> Self {
        Self {
            reminder_interval_secs: default_reminder_interval_secs(),
            confirmation_window_secs: default_confirmation_window_secs(),
            correlation_window_ms: default_correlation_window_ms(),
            audit_fetch_limit: default_audit_fetch_limit(),
        }
    }
}

/// Cron schedules (seconds precision, UTC) for bucket rollover.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RolloverConfig {
    /// Daily bucket reset.
    pub daily_cron: String,
    /// Weekly bucket reset.
    pub weekly_cron: String,
    /// Monthly bucket reset.
    pub monthly_cron: String,
    /// How often the rollover loop checks for due schedules.
    pub tick_secs: u64,
}

impl Default for RolloverConfig {
    fn default() -> Self {
        Self {
            daily_cron: "0 0 0 * * *".to_owned(),
            weekly_cron: "0 0 0 * * Mon".to_owned(),
            monthly_cron: "0 0 0 1 * *".to_owned(),
            tick_secs: 30,
        }
    }
}

/// Filesystem paths.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where JSON logs are written. Defaults to `~/.modwatch/logs`.
    pub logs_dir: Option<PathBuf>,
}

/// A workspace configured in the file rather than through setup commands.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceSeed {
    /// Workspace identifier.
    pub id: WorkspaceId,
    /// Activity log channel (duty changes, probes, reports).
    #[serde(default)]
    pub log_channel: Option<ChannelId>,
    /// Channel for message deletion attributions.
    #[serde(default)]
    pub message_log_channel: Option<ChannelId>,
    /// Channel for forced-move attributions.
    #[serde(default)]
    pub voice_log_channel: Option<ChannelId>,
    /// Roles that mark a member as a moderator.
    #[serde(default)]
    pub moderator_roles: Vec<RoleId>,
    /// Per-workspace probe cadence override.
    #[serde(default)]
    pub reminder_interval_secs: Option<u64>,
    /// Per-workspace acknowledgement window override.
    #[serde(default)]
    pub confirmation_window_secs: Option<u64>,
    /// Per-workspace correlation window override.
    #[serde(default)]
    pub correlation_window_ms: Option<u64>,
}

impl WorkspaceSeed {
    /// Timing overrides, when present, must be non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error naming the workspace and the zero override.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("reminder_interval_secs", self.reminder_interval_secs),
            ("confirmation_window_secs", self.confirmation_window_secs),
            ("correlation_window_ms", self.correlation_window_ms),
        ] {
            if value == Some(0) {
                anyhow::bail!("workspaces[id = {}].{name} must be positive", self.id);
            }
        }
        Ok(())
    }
}

// Default value functions for serde

fn default_reminder_interval_secs() -> u64 {
    1800
}
fn default_confirmation_window_secs() -> u64 {
    120
}
fn default_correlation_window_ms() -> u64 {
    10_000
}
fn default_audit_fetch_limit() -> usize {
    6
}

/// Resolve the default config directory (`~/.modwatch/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".modwatch"))
}
