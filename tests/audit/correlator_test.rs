//! Tests for `src/audit/correlator.rs` against the in-memory platform.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use modwatch::audit::{
    AuditEntry, AuditKind, AuditSource, CorrelationOutcome, Correlator, InMemoryPlatform,
    MembershipSource, SideEffect, SideEffectEvent,
};
use modwatch::config::{ConfigStore, TimingDefaults};
use modwatch::types::{ActorId, ChannelId, RoleId, WorkspaceId};

const WS: WorkspaceId = WorkspaceId(1);
const MOD_ROLE: RoleId = RoleId(5);
const MODERATOR: ActorId = ActorId(100);
const MEMBER: ActorId = ActorId(200);
const AUTHOR: ActorId = ActorId(300);
const TEXT: ChannelId = ChannelId(11);
const VOICE: ChannelId = ChannelId(12);
const MESSAGE_LOG: ChannelId = ChannelId(20);
const VOICE_LOG: ChannelId = ChannelId(30);

struct Harness {
    config: Arc<ConfigStore>,
    platform: Arc<InMemoryPlatform>,
    correlator: Correlator,
}

fn harness() -> Harness {
    let config = Arc::new(ConfigStore::new(TimingDefaults::default()));
    config.update(WS, |cfg| {
        cfg.message_log_channel_id = Some(MESSAGE_LOG);
        cfg.voice_log_channel_id = Some(VOICE_LOG);
        cfg.moderator_role_ids.insert(MOD_ROLE);
    });
    let platform = Arc::new(InMemoryPlatform::new());
    platform.set_roles(WS, MODERATOR, [MOD_ROLE]);
    platform.set_roles(WS, MEMBER, [RoleId(6)]);
    let audit: Arc<dyn AuditSource> = platform.clone();
    let members: Arc<dyn MembershipSource> = platform.clone();
    let correlator = Correlator::new(Arc::clone(&config), audit, members, 6);
    Harness {
        config,
        platform,
        correlator,
    }
}

fn delete_event(now: DateTime<Utc>) -> SideEffectEvent {
    SideEffectEvent {
        workspace_id: WS,
        effect: SideEffect::MessageDelete {
            author_id: AUTHOR,
            author_is_bot: false,
            channel_id: TEXT,
            content: Some("spam".to_owned()),
        },
        occurred_at: now,
    }
}

fn delete_entry(executor: ActorId, created_at: DateTime<Utc>) -> AuditEntry {
    AuditEntry {
        kind: AuditKind::MessageDelete,
        executor_id: executor,
        executor_is_bot: false,
        target_id: Some(AUTHOR),
        channel_id: Some(TEXT),
        created_at,
    }
}

#[tokio::test]
async fn fresh_moderator_entry_is_attributed() {
    let h = harness();
    let now = Utc::now();
    h.platform
        .push_entry(WS, delete_entry(MODERATOR, now - ChronoDuration::seconds(2)));

    let event = delete_event(now);
    match h.correlator.correlate(&event).await {
        CorrelationOutcome::Attributed(attribution) => {
            assert_eq!(attribution.executor_id, MODERATOR);
            assert_eq!(attribution.event, event);
            assert_eq!(attribution.kind(), AuditKind::MessageDelete);
            assert_eq!(attribution.target_id(), Some(AUTHOR));
            assert_eq!(attribution.channel_id(), Some(TEXT));
        }
        other => panic!("expected attribution, got {other:?}"),
    }
}

#[tokio::test]
async fn stale_entry_is_not_attributed() {
    let h = harness();
    let now = Utc::now();
    h.platform
        .push_entry(WS, delete_entry(MODERATOR, now - ChronoDuration::seconds(15)));

    let outcome = h.correlator.correlate(&delete_event(now)).await;
    assert_eq!(outcome, CorrelationOutcome::Unattributed);
}

#[tokio::test]
async fn entry_for_other_target_is_not_attributed() {
    let h = harness();
    let now = Utc::now();
    let mut entry = delete_entry(MODERATOR, now);
    entry.target_id = Some(ActorId(999));
    h.platform.push_entry(WS, entry);

    let outcome = h.correlator.correlate(&delete_event(now)).await;
    assert_eq!(outcome, CorrelationOutcome::Unattributed);
}

#[tokio::test]
async fn non_moderator_executor_is_rejected() {
    let h = harness();
    let now = Utc::now();
    h.platform.push_entry(WS, delete_entry(MEMBER, now));

    let outcome = h.correlator.correlate(&delete_event(now)).await;
    assert_eq!(outcome, CorrelationOutcome::NotModerator(MEMBER));
}

#[tokio::test]
async fn bot_executor_is_rejected() {
    let h = harness();
    let now = Utc::now();
    let mut entry = delete_entry(MODERATOR, now);
    entry.executor_is_bot = true;
    h.platform.push_entry(WS, entry);

    let outcome = h.correlator.correlate(&delete_event(now)).await;
    assert_eq!(outcome, CorrelationOutcome::NotModerator(MODERATOR));
}

#[tokio::test]
async fn bot_authored_message_is_ignored() {
    let h = harness();
    let now = Utc::now();
    h.platform.push_entry(WS, delete_entry(MODERATOR, now));

    let event = SideEffectEvent {
        workspace_id: WS,
        effect: SideEffect::MessageDelete {
            author_id: AUTHOR,
            author_is_bot: true,
            channel_id: TEXT,
            content: None,
        },
        occurred_at: now,
    };
    assert_eq!(
        h.correlator.correlate(&event).await,
        CorrelationOutcome::Ignored
    );
}

#[tokio::test]
async fn audit_outage_yields_source_unavailable() {
    let h = harness();
    let now = Utc::now();
    h.platform.push_entry(WS, delete_entry(MODERATOR, now));
    h.platform.set_audit_unavailable(true);

    let outcome = h.correlator.correlate(&delete_event(now)).await;
    assert_eq!(outcome, CorrelationOutcome::SourceUnavailable);

    h.platform.set_audit_unavailable(false);
    assert!(matches!(
        h.correlator.correlate(&delete_event(now)).await,
        CorrelationOutcome::Attributed(_)
    ));
}

#[tokio::test]
async fn membership_outage_treats_executor_as_non_moderator() {
    let h = harness();
    let now = Utc::now();
    h.platform.push_entry(WS, delete_entry(MODERATOR, now));
    h.platform.set_membership_unavailable(true);

    let outcome = h.correlator.correlate(&delete_event(now)).await;
    assert_eq!(outcome, CorrelationOutcome::NotModerator(MODERATOR));
}

#[tokio::test]
async fn missing_log_channel_skips_lookup() {
    let h = harness();
    h.config.update(WS, |cfg| cfg.message_log_channel_id = None);
    h.platform.set_audit_unavailable(true);

    let outcome = h.correlator.correlate(&delete_event(Utc::now())).await;
    assert_eq!(outcome, CorrelationOutcome::ConfigMissing);
}

#[tokio::test]
async fn missing_moderator_roles_is_config_missing() {
    let h = harness();
    h.config.update(WS, |cfg| cfg.moderator_role_ids.clear());

    let outcome = h.correlator.correlate(&delete_event(Utc::now())).await;
    assert_eq!(outcome, CorrelationOutcome::ConfigMissing);
}

#[tokio::test]
async fn forced_move_matches_on_destination_channel() {
    let h = harness();
    let now = Utc::now();
    h.platform.push_entry(
        WS,
        AuditEntry {
            kind: AuditKind::MemberMove,
            executor_id: MODERATOR,
            executor_is_bot: false,
            target_id: None,
            channel_id: Some(VOICE),
            created_at: now - ChronoDuration::seconds(1),
        },
    );

    let event = SideEffectEvent {
        workspace_id: WS,
        effect: SideEffect::ForcedMove {
            member_id: MEMBER,
            channel_id: VOICE,
        },
        occurred_at: now,
    };
    match h.correlator.correlate(&event).await {
        CorrelationOutcome::Attributed(attribution) => {
            assert_eq!(attribution.executor_id, MODERATOR);
            assert_eq!(attribution.target_id(), Some(MEMBER));
        }
        other => panic!("expected attribution, got {other:?}"),
    }
}

#[tokio::test]
async fn only_recent_entries_are_considered() {
    let h = harness();
    let now = Utc::now();
    h.platform.push_entry(WS, delete_entry(MODERATOR, now));
    // Six newer deletions of someone else's messages push the match out of
    // the fetched page.
    for _ in 0..6 {
        let mut other = delete_entry(MODERATOR, now);
        other.target_id = Some(ActorId(999));
        h.platform.push_entry(WS, other);
    }

    let outcome = h.correlator.correlate(&delete_event(now)).await;
    assert_eq!(outcome, CorrelationOutcome::Unattributed);
}

#[tokio::test]
async fn newest_matching_entry_wins() {
    let h = harness();
    let now = Utc::now();
    h.platform
        .push_entry(WS, delete_entry(MEMBER, now - ChronoDuration::seconds(3)));
    h.platform
        .push_entry(WS, delete_entry(MODERATOR, now - ChronoDuration::seconds(1)));

    assert!(matches!(
        h.correlator.correlate(&delete_event(now)).await,
        CorrelationOutcome::Attributed(a) if a.executor_id == MODERATOR
    ));
}

#[tokio::test]
async fn workspace_window_override_applies() {
    let h = harness();
    h.config.update(WS, |cfg| {
        cfg.correlation_window = std::time::Duration::from_secs(30);
    });
    let now = Utc::now();
    h.platform
        .push_entry(WS, delete_entry(MODERATOR, now - ChronoDuration::seconds(15)));

    assert!(matches!(
        h.correlator.correlate(&delete_event(now)).await,
        CorrelationOutcome::Attributed(_)
    ));
}
