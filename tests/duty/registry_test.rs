//! Tests for `src/duty/mod.rs`: session lifecycle and per-key serialization.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use modwatch::config::{ConfigStore, TimingDefaults};
use modwatch::duty::{DutyError, DutyRegistry};
use modwatch::notifier::{ChannelNotifier, Notification, Outbound};
use modwatch::stats::StatsAggregator;
use modwatch::types::{ActorId, ChannelId, EndReason, WorkspaceId};

const WS: WorkspaceId = WorkspaceId(1);
const OTHER_WS: WorkspaceId = WorkspaceId(2);
const MOD: ActorId = ActorId(100);
const LOG: ChannelId = ChannelId(10);

struct Harness {
    registry: Arc<DutyRegistry>,
    stats: Arc<StatsAggregator>,
    outbound: mpsc::Receiver<Outbound>,
}

fn harness(log_channel: Option<ChannelId>) -> Harness {
    let config = Arc::new(ConfigStore::new(TimingDefaults::default()));
    config.update(WS, |cfg| cfg.log_channel_id = log_channel);
    let stats = Arc::new(StatsAggregator::new());
    let (notifier, outbound) = ChannelNotifier::new(64);
    let registry = Arc::new(DutyRegistry::new(
        Arc::clone(&config),
        Arc::clone(&stats),
        Arc::new(notifier),
        true,
    ));
    Harness {
        registry,
        stats,
        outbound,
    }
}

fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Outbound> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

#[tokio::test]
async fn start_registers_session_and_announces_it() {
    let mut h = harness(Some(LOG));

    let session = h.registry.start_session(WS, MOD).await.expect("start");
    assert_eq!(session.workspace_id, WS);
    assert_eq!(session.actor_id, MOD);
    assert!(h.registry.is_active(WS, MOD));
    assert_eq!(h.registry.active_count(), 1);

    let sent = drain(&mut h.outbound);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].channel_id, LOG);
    assert_eq!(
        sent[0].notification,
        Notification::DutyStarted { actor_id: MOD }
    );
}

#[tokio::test]
async fn second_start_is_rejected_and_keeps_first_session() {
    let h = harness(Some(LOG));

    let first = h.registry.start_session(WS, MOD).await.expect("start");
    let err = h
        .registry
        .start_session(WS, MOD)
        .await
        .expect_err("already active");
    assert_eq!(
        err,
        DutyError::AlreadyActive {
            workspace_id: WS,
            actor_id: MOD,
        }
    );

    let current = h.registry.session(WS, MOD).expect("still active");
    assert_eq!(current.session_id, first.session_id);
    assert_eq!(current.started_at, first.started_at);
}

#[tokio::test]
async fn ending_missing_session_changes_nothing() {
    let mut h = harness(Some(LOG));

    let ended = h.registry.end_session(WS, MOD, EndReason::Manual).await;
    assert!(ended.is_none());
    assert!(h.stats.get(WS, MOD).is_none());
    assert!(drain(&mut h.outbound).is_empty());
}

#[tokio::test]
async fn manual_end_records_duration_and_announces_it() {
    let mut h = harness(Some(LOG));

    h.registry.start_session(WS, MOD).await.expect("start");
    let elapsed = h
        .registry
        .end_session(WS, MOD, EndReason::Manual)
        .await
        .expect("was active");

    assert!(!h.registry.is_active(WS, MOD));
    let record = h.stats.get(WS, MOD).expect("recorded");
    let ms = u64::try_from(elapsed.as_millis()).expect("fits");
    assert_eq!(record.active_ms.daily, ms);
    assert_eq!(record.active_ms.weekly, ms);
    assert_eq!(record.active_ms.monthly, ms);

    let sent = drain(&mut h.outbound);
    assert!(matches!(
        sent.last().map(|o| &o.notification),
        Some(Notification::DutyEnded {
            reason: EndReason::Manual,
            ..
        })
    ));
}

#[tokio::test]
async fn end_twice_only_counts_once() {
    let h = harness(Some(LOG));

    h.registry.start_session(WS, MOD).await.expect("start");
    assert!(h
        .registry
        .end_session(WS, MOD, EndReason::Manual)
        .await
        .is_some());
    let before = h.stats.get(WS, MOD).expect("recorded");
    assert!(h
        .registry
        .end_session(WS, MOD, EndReason::Manual)
        .await
        .is_none());
    assert_eq!(h.stats.get(WS, MOD), Some(before));
}

#[tokio::test]
async fn sessions_are_scoped_per_workspace() {
    let h = harness(Some(LOG));

    h.registry.start_session(WS, MOD).await.expect("start ws");
    h.registry
        .start_session(OTHER_WS, MOD)
        .await
        .expect("start other ws");
    h.registry
        .start_session(WS, ActorId(50))
        .await
        .expect("second moderator");

    let active: Vec<ActorId> = h
        .registry
        .active_in(WS)
        .into_iter()
        .map(|s| s.actor_id)
        .collect();
    assert_eq!(active, vec![ActorId(50), MOD]);

    h.registry.end_session(WS, MOD, EndReason::Manual).await;
    assert!(h.registry.is_active(OTHER_WS, MOD));
}

#[tokio::test]
async fn missing_log_channel_still_tracks_duty() {
    let mut h = harness(None);

    h.registry.start_session(WS, MOD).await.expect("start");
    assert!(h.registry.is_active(WS, MOD));
    h.registry.end_session(WS, MOD, EndReason::Manual).await;
    assert!(h.stats.get(WS, MOD).is_some());
    assert!(drain(&mut h.outbound).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_admit_exactly_one() {
    let h = harness(Some(LOG));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = Arc::clone(&h.registry);
            tokio::spawn(async move { registry.start_session(WS, MOD).await })
        })
        .collect();

    let mut started = 0;
    for handle in handles {
        if handle.await.expect("join").is_ok() {
            started += 1;
        }
    }
    assert_eq!(started, 1);
    assert_eq!(h.registry.active_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ends_record_duration_once() {
    let h = harness(Some(LOG));
    h.registry.start_session(WS, MOD).await.expect("start");
    tokio::time::sleep(Duration::from_millis(20)).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&h.registry);
            tokio::spawn(async move { registry.end_session(WS, MOD, EndReason::Manual).await })
        })
        .collect();

    let mut ended = Vec::new();
    for handle in handles {
        if let Some(elapsed) = handle.await.expect("join") {
            ended.push(elapsed);
        }
    }
    assert_eq!(ended.len(), 1);
    let record = h.stats.get(WS, MOD).expect("recorded");
    assert_eq!(
        record.active_ms.daily,
        u64::try_from(ended[0].as_millis()).expect("fits")
    );
}
