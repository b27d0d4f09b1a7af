//! Per-moderator activity counters with independent daily, weekly and
//! monthly buckets.
//!
//! Every finished session adds its duration to all three buckets; every
//! attributed action bumps all three action counters. Rollover snapshots one
//! bucket into a [`StatsReport`] and zeroes it without touching the others.

pub mod rollover;

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::types::{ActorId, DutyKey, Period, WorkspaceId};

/// One counter per rollover cadence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodTotals {
    /// Since the last daily rollover.
    pub daily: u64,
    /// Since the last weekly rollover.
    pub weekly: u64,
    /// Since the last monthly rollover.
    pub monthly: u64,
}

impl PeriodTotals {
    /// Value of one bucket.
    pub fn get(&self, period: Period) -> u64 {
        match period {
            Period::Daily => self.daily,
            Period::Weekly => self.weekly,
            Period::Monthly => self.monthly,
        }
    }

    /// Add to every bucket, saturating.
    fn add(&mut self, amount: u64) {
        self.daily = self.daily.saturating_add(amount);
        self.weekly = self.weekly.saturating_add(amount);
        self.monthly = self.monthly.saturating_add(amount);
    }

    /// Zero one bucket.
    fn reset(&mut self, period: Period) {
        match period {
            Period::Daily => self.daily = 0,
            Period::Weekly => self.weekly = 0,
            Period::Monthly => self.monthly = 0,
        }
    }
}

/// Counters for one moderator in one workspace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsRecord {
    /// Active duty time in milliseconds.
    pub active_ms: PeriodTotals,
    /// Attributed moderation actions.
    pub actions: PeriodTotals,
}

/// Why a report was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTrigger {
    /// Scheduled rollover; the bucket was reset afterwards.
    Rollover,
    /// A stats command; nothing was reset.
    OnDemand,
}

/// One line of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRow {
    /// Moderator.
    pub actor_id: ActorId,
    /// Active time in the reported bucket.
    pub active: Duration,
    /// Actions in the reported bucket.
    pub actions: u64,
}

/// Snapshot of one bucket across a workspace's moderators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsReport {
    /// Workspace reported on.
    pub workspace_id: WorkspaceId,
    /// Bucket reported on.
    pub period: Period,
    /// Rollover or command.
    pub trigger: ReportTrigger,
    /// Report time.
    pub generated_at: DateTime<Utc>,
    /// Rows ordered by actor id. Empty means "no data".
    pub rows: Vec<StatsRow>,
}

impl StatsReport {
    /// Whether the report carries no data.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Shared counters keyed by (workspace, actor).
///
/// Each key is locked independently, so updates for different moderators
/// never contend.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    records: DashMap<DutyKey, StatsRecord>,
}

impl StatsAggregator {
    /// Empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finished session's duration to all three buckets.
    pub fn record_duration(&self, workspace_id: WorkspaceId, actor_id: ActorId, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let mut record = self
            .records
            .entry(DutyKey::new(workspace_id, actor_id))
            .or_default();
        record.active_ms.add(ms);
        debug!(
            workspace = %workspace_id,
            actor = %actor_id,
            added_ms = ms,
            daily_ms = record.active_ms.daily,
            "duty time recorded"
        );
    }

    /// Count one attributed action in all three buckets.
    pub fn record_action(&self, workspace_id: WorkspaceId, actor_id: ActorId) {
        self.records
            .entry(DutyKey::new(workspace_id, actor_id))
            .or_default()
            .actions
            .add(1);
    }

    /// Current counters for one moderator.
    pub fn get(&self, workspace_id: WorkspaceId, actor_id: ActorId) -> Option<StatsRecord> {
        self.records
            .get(&DutyKey::new(workspace_id, actor_id))
            .map(|r| *r.value())
    }

    /// Report one bucket without resetting it.
    pub fn report(&self, workspace_id: WorkspaceId, period: Period) -> StatsReport {
        let rows = self.collect_rows(workspace_id, period, false);
        Self::build_report(workspace_id, period, ReportTrigger::OnDemand, rows)
    }

    /// Report one bucket and zero it for every moderator in the workspace.
    ///
    /// Each record is read and reset under its own entry lock, so a session
    /// ending concurrently lands either in this report or in the next one.
    pub fn rollover(&self, workspace_id: WorkspaceId, period: Period) -> StatsReport {
        let rows = self.collect_rows(workspace_id, period, true);
        Self::build_report(workspace_id, period, ReportTrigger::Rollover, rows)
    }

    /// [`rollover`](Self::rollover) for the daily bucket.
    pub fn rollover_daily(&self, workspace_id: WorkspaceId) -> StatsReport {
        self.rollover(workspace_id, Period::Daily)
    }

    /// Workspaces that have any counters, sorted.
    pub fn workspace_ids(&self) -> Vec<WorkspaceId> {
        let mut ids: Vec<WorkspaceId> = self.records.iter().map(|r| r.key().workspace_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn collect_rows(&self, workspace_id: WorkspaceId, period: Period, reset: bool) -> Vec<StatsRow> {
        let mut rows: Vec<StatsRow> = self
            .records
            .iter_mut()
            .filter(|entry| entry.key().workspace_id == workspace_id)
            .map(|mut entry| {
                let actor_id = entry.key().actor_id;
                let record = entry.value_mut();
                let row = StatsRow {
                    actor_id,
                    active: Duration::from_millis(record.active_ms.get(period)),
                    actions: record.actions.get(period),
                };
                if reset {
                    record.active_ms.reset(period);
                    record.actions.reset(period);
                }
                row
            })
            .collect();
        rows.sort_by_key(|row| row.actor_id);
        rows
    }

    fn build_report(
        workspace_id: WorkspaceId,
        period: Period,
        trigger: ReportTrigger,
        rows: Vec<StatsRow>,
    ) -> StatsReport {
        StatsReport {
            workspace_id,
            period,
            trigger,
            generated_at: Utc::now(),
            rows,
        }
    }
}
