//! Tests for `src/stats/mod.rs`: bucket accounting and reports.

use std::time::Duration;

use modwatch::notifier::render::render;
use modwatch::notifier::Notification;
use modwatch::stats::{ReportTrigger, StatsAggregator, StatsRow};
use modwatch::types::{ActorId, Period, WorkspaceId};

const WS: WorkspaceId = WorkspaceId(1);
const MOD: ActorId = ActorId(100);

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[test]
fn duration_lands_in_every_bucket() {
    let stats = StatsAggregator::new();
    stats.record_duration(WS, MOD, Duration::from_millis(1_920_000));

    let record = stats.get(WS, MOD).expect("recorded");
    for period in Period::ALL {
        assert_eq!(record.active_ms.get(period), 1_920_000);
    }
}

#[test]
fn daily_rollover_leaves_other_buckets_alone() {
    let stats = StatsAggregator::new();
    // Build daily=500s, weekly=1200s, monthly=3000s.
    stats.record_duration(WS, MOD, secs(1800));
    stats.rollover(WS, Period::Weekly);
    stats.rollover(WS, Period::Daily);
    stats.record_duration(WS, MOD, secs(700));
    stats.rollover(WS, Period::Daily);
    stats.record_duration(WS, MOD, secs(500));

    let before = stats.get(WS, MOD).expect("recorded");
    assert_eq!(before.active_ms.daily, 500_000);
    assert_eq!(before.active_ms.weekly, 1_200_000);
    assert_eq!(before.active_ms.monthly, 3_000_000);

    let report = stats.rollover_daily(WS);
    assert_eq!(report.trigger, ReportTrigger::Rollover);
    assert_eq!(
        report.rows,
        vec![StatsRow {
            actor_id: MOD,
            active: secs(500),
            actions: 0,
        }]
    );

    let after = stats.get(WS, MOD).expect("still tracked");
    assert_eq!(after.active_ms.daily, 0);
    assert_eq!(after.active_ms.weekly, 1_200_000);
    assert_eq!(after.active_ms.monthly, 3_000_000);
}

#[test]
fn buckets_never_decrease_between_rollovers() {
    let stats = StatsAggregator::new();
    let mut last = 0;
    for ms in [10, 0, 250, 5] {
        stats.record_duration(WS, MOD, Duration::from_millis(ms));
        let now = stats.get(WS, MOD).expect("recorded").active_ms.monthly;
        assert!(now >= last);
        last = now;
    }
    assert_eq!(last, 265);
}

#[test]
fn actions_are_counted_per_bucket() {
    let stats = StatsAggregator::new();
    stats.record_action(WS, MOD);
    stats.record_action(WS, MOD);
    stats.rollover(WS, Period::Daily);
    stats.record_action(WS, MOD);

    let record = stats.get(WS, MOD).expect("recorded");
    assert_eq!(record.actions.daily, 1);
    assert_eq!(record.actions.weekly, 3);
    assert_eq!(record.actions.monthly, 3);
}

#[test]
fn on_demand_report_does_not_reset() {
    let stats = StatsAggregator::new();
    stats.record_duration(WS, MOD, secs(90));

    let report = stats.report(WS, Period::Weekly);
    assert_eq!(report.trigger, ReportTrigger::OnDemand);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(
        stats.get(WS, MOD).expect("recorded").active_ms.weekly,
        90_000
    );
}

#[test]
fn reports_are_scoped_and_sorted() {
    let stats = StatsAggregator::new();
    stats.record_duration(WS, ActorId(30), secs(1));
    stats.record_duration(WS, ActorId(10), secs(2));
    stats.record_duration(WorkspaceId(2), ActorId(20), secs(3));

    let report = stats.report(WS, Period::Daily);
    let actors: Vec<ActorId> = report.rows.iter().map(|r| r.actor_id).collect();
    assert_eq!(actors, vec![ActorId(10), ActorId(30)]);
    assert_eq!(stats.workspace_ids(), vec![WS, WorkspaceId(2)]);
}

#[test]
fn empty_report_renders_no_data() {
    let stats = StatsAggregator::new();
    let report = stats.report(WS, Period::Monthly);
    assert!(report.is_empty());
    assert_eq!(
        render(&Notification::Report(report)),
        "\u{1F4C6} **Monthly Stats**\nNo data."
    );
}

#[test]
fn report_rows_render_duration_and_actions() {
    let stats = StatsAggregator::new();
    stats.record_duration(WS, MOD, secs(3725));
    stats.record_action(WS, MOD);
    stats.record_action(WS, MOD);

    let text = render(&Notification::Report(stats.report(WS, Period::Daily)));
    assert!(text.contains("<@100> \u{2014} 1h 2m 5s (2 actions)"));
}
