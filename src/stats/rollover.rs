//! Cron evaluation and scheduled bucket rollover.
//!
//! Runs as a background Tokio task, ticking at a configurable interval. Each
//! tick checks the daily, weekly and monthly cron schedules and rolls over
//! every workspace whose activity log channel is configured.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::{ConfigStore, RolloverConfig};
use crate::notifier::{self, Notification, Notifier};
use crate::types::{Period, WorkspaceId};

use super::StatsAggregator;

/// A cron schedule bound to one bucket.
#[derive(Debug, Clone)]
pub struct RolloverSchedule {
    /// Bucket reset by this schedule.
    pub period: Period,
    /// When it fires (UTC).
    pub schedule: cron::Schedule,
}

/// Parse the three schedules from config.
///
/// # Errors
///
/// Returns an error if any cron expression is invalid.
pub fn schedules_from_config(config: &RolloverConfig) -> anyhow::Result<Vec<RolloverSchedule>> {
    [
        (Period::Daily, &config.daily_cron),
        (Period::Weekly, &config.weekly_cron),
        (Period::Monthly, &config.monthly_cron),
    ]
    .into_iter()
    .map(|(period, expr)| {
        let schedule = cron::Schedule::from_str(expr)
            .with_context(|| format!("invalid {period} rollover cron: {expr}"))?;
        Ok(RolloverSchedule { period, schedule })
    })
    .collect()
}

/// Tracks the last rollover time per bucket.
#[derive(Debug)]
pub struct RolloverState {
    last_run: HashMap<Period, DateTime<Utc>>,
}

impl RolloverState {
    /// State in which every bucket was last rolled over at `at`.
    ///
    /// Starting from the process start time means a restart never triggers
    /// an immediate rollover for a boundary that passed while it was down.
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            last_run: Period::ALL.into_iter().map(|p| (p, at)).collect(),
        }
    }

    /// Record that a bucket was rolled over at the given time.
    pub fn record_run(&mut self, period: Period, at: DateTime<Utc>) {
        self.last_run.insert(period, at);
    }

    /// Last rollover time for a bucket.
    pub fn last_run_for(&self, period: Period) -> Option<&DateTime<Utc>> {
        self.last_run.get(&period)
    }
}

/// Buckets whose schedule fired between their last run and `now`.
pub fn due_periods(
    schedules: &[RolloverSchedule],
    state: &RolloverState,
    now: DateTime<Utc>,
) -> Vec<Period> {
    schedules
        .iter()
        .filter(|s| {
            let after = state
                .last_run_for(s.period)
                .copied()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            s.schedule.after(&after).take(1).any(|next| next <= now)
        })
        .map(|s| s.period)
        .collect()
}

/// Shared dependencies for the rollover runner.
pub struct RolloverDeps {
    /// Counters to roll over.
    pub stats: Arc<StatsAggregator>,
    /// Workspace settings (activity log channel).
    pub config: Arc<ConfigStore>,
    /// Report sink.
    pub notifier: Arc<dyn Notifier>,
    /// Parsed schedules.
    pub schedules: Vec<RolloverSchedule>,
    /// Tick interval.
    pub tick: Duration,
}

/// Roll over one bucket for one workspace and post the report.
///
/// Without an activity log channel nothing is reset or sent. Returns whether
/// the rollover ran.
pub async fn rollover_workspace(
    stats: &StatsAggregator,
    config: &ConfigStore,
    notifier: &dyn Notifier,
    workspace_id: WorkspaceId,
    period: Period,
) -> bool {
    let Some(channel) = config.get(workspace_id).log_channel_id else {
        return false;
    };

    let report = stats.rollover(workspace_id, period);
    info!(
        workspace = %workspace_id,
        period = period.as_str(),
        moderators = report.rows.len(),
        "stats rolled over"
    );
    notifier::dispatch(
        notifier,
        workspace_id,
        Some(channel),
        Notification::Report(report),
    )
    .await;
    true
}

/// Run one tick: roll over every due bucket in every known workspace.
pub async fn run_tick(deps: &RolloverDeps, state: &mut RolloverState, now: DateTime<Utc>) {
    let due = due_periods(&deps.schedules, state, now);
    if due.is_empty() {
        return;
    }

    let mut workspaces = deps.config.workspace_ids();
    workspaces.extend(deps.stats.workspace_ids());
    workspaces.sort();
    workspaces.dedup();

    for period in due {
        for &workspace_id in &workspaces {
            let ran = rollover_workspace(
                &deps.stats,
                &deps.config,
                deps.notifier.as_ref(),
                workspace_id,
                period,
            )
            .await;
            if !ran {
                debug!(
                    workspace = %workspace_id,
                    period = period.as_str(),
                    "no activity log channel, rollover skipped"
                );
            }
        }
        state.record_run(period, now);
    }
}

/// Run the rollover background loop until shutdown.
pub async fn run(deps: RolloverDeps, mut shutdown_rx: watch::Receiver<bool>) {
    info!(tick_secs = deps.tick.as_secs(), "rollover scheduler started");

    let mut interval = tokio::time::interval(deps.tick);
    let mut state = RolloverState::starting_at(Utc::now());

    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_tick(&deps, &mut state, Utc::now()).await;
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("rollover scheduler shutting down");
                    break;
                }
            }
        }
    }
}
