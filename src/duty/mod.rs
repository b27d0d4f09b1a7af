//! On-duty session registry.
//!
//! The [`DutyRegistry`] is the source of truth for who is on duty. Each live
//! session owns a liveness reminder task (see [`reminder`]) and the state of
//! its outstanding probe. Start, end, acknowledge and timeout for one
//! (workspace, actor) key are serialized by that key's map entry; different
//! keys never contend on a shared lock.

pub mod reminder;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ConfigStore;
use crate::notifier::{self, Notification, Notifier};
use crate::stats::StatsAggregator;
use crate::types::{ActorId, DutyKey, EndReason, WorkspaceId};

use self::reminder::{ProbeSlot, ReminderPhase};

/// Duty command errors surfaced to the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DutyError {
    /// The moderator is already on duty in this workspace.
    #[error("actor {actor_id} is already on duty in workspace {workspace_id}")]
    AlreadyActive {
        /// Workspace of the existing session.
        workspace_id: WorkspaceId,
        /// Moderator already on duty.
        actor_id: ActorId,
    },
    /// The caller holds no configured moderator role.
    #[error("actor {0} is not a moderator")]
    NotModerator(ActorId),
}

/// An open on-duty interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeratorSession {
    /// Unique per start; a restarted session gets a new id.
    pub session_id: Uuid,
    /// Workspace the moderator is on duty in.
    pub workspace_id: WorkspaceId,
    /// Moderator on duty.
    pub actor_id: ActorId,
    /// Wall-clock start, for display.
    pub started_at: DateTime<Utc>,
    /// Monotonic start, for measuring duration.
    started: Instant,
}

impl ModeratorSession {
    fn begin(key: DutyKey) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            workspace_id: key.workspace_id,
            actor_id: key.actor_id,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Time on duty so far.
    pub fn elapsed(&self) -> Duration {
        Instant::now().saturating_duration_since(self.started)
    }
}

/// Registry entry: the session plus its reminder bookkeeping.
struct ActiveSession {
    session: ModeratorSession,
    probe: ProbeSlot,
    /// Dropping this stops the session's reminder task.
    _cancel: oneshot::Sender<()>,
}

/// Holds the current on-duty sessions.
pub struct DutyRegistry {
    sessions: DashMap<DutyKey, ActiveSession>,
    config: Arc<ConfigStore>,
    stats: Arc<StatsAggregator>,
    notifier: Arc<dyn Notifier>,
    reminders_enabled: AtomicBool,
}

impl std::fmt::Debug for DutyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DutyRegistry")
            .field("active", &self.sessions.len())
            .field("reminders_enabled", &self.reminders_enabled())
            .finish_non_exhaustive()
    }
}

impl DutyRegistry {
    /// Create an empty registry.
    pub fn new(
        config: Arc<ConfigStore>,
        stats: Arc<StatsAggregator>,
        notifier: Arc<dyn Notifier>,
        reminders_enabled: bool,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            stats,
            notifier,
            reminders_enabled: AtomicBool::new(reminders_enabled),
        }
    }

    /// Put a moderator on duty and start their reminder task.
    ///
    /// # Errors
    ///
    /// Returns [`DutyError::AlreadyActive`] if a session already exists for
    /// the pair; the existing session is left untouched.
    pub async fn start_session(
        self: &Arc<Self>,
        workspace_id: WorkspaceId,
        actor_id: ActorId,
    ) -> Result<ModeratorSession, DutyError> {
        let key = DutyKey::new(workspace_id, actor_id);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        let session = match self.sessions.entry(key) {
            Entry::Occupied(_) => {
                return Err(DutyError::AlreadyActive {
                    workspace_id,
                    actor_id,
                })
            }
            Entry::Vacant(slot) => {
                let session = ModeratorSession::begin(key);
                slot.insert(ActiveSession {
                    session: session.clone(),
                    probe: ProbeSlot::Idle,
                    _cancel: cancel_tx,
                });
                session
            }
        };

        tokio::spawn(reminder::run(
            Arc::clone(self),
            key,
            session.session_id,
            cancel_rx,
        ));

        info!(
            workspace = %workspace_id,
            actor = %actor_id,
            session_id = %session.session_id,
            "duty started"
        );
        let channel = self.config.get(workspace_id).log_channel_id;
        notifier::dispatch(
            self.notifier.as_ref(),
            workspace_id,
            channel,
            Notification::DutyStarted { actor_id },
        )
        .await;

        Ok(session)
    }

    /// Take a moderator off duty.
    ///
    /// Returns the session length, or `None` (and changes nothing) when the
    /// moderator was not on duty.
    pub async fn end_session(
        &self,
        workspace_id: WorkspaceId,
        actor_id: ActorId,
        reason: EndReason,
    ) -> Option<Duration> {
        let (_, active) = self
            .sessions
            .remove(&DutyKey::new(workspace_id, actor_id))?;
        Some(self.finish(active, reason).await)
    }

    /// Whether the moderator is on duty.
    pub fn is_active(&self, workspace_id: WorkspaceId, actor_id: ActorId) -> bool {
        self.sessions
            .contains_key(&DutyKey::new(workspace_id, actor_id))
    }

    /// The moderator's live session, if any.
    pub fn session(&self, workspace_id: WorkspaceId, actor_id: ActorId) -> Option<ModeratorSession> {
        self.sessions
            .get(&DutyKey::new(workspace_id, actor_id))
            .map(|active| active.session.clone())
    }

    /// Moderators on duty in a workspace, ordered by actor id.
    pub fn active_in(&self, workspace_id: WorkspaceId) -> Vec<ModeratorSession> {
        let mut sessions: Vec<ModeratorSession> = self
            .sessions
            .iter()
            .filter(|entry| entry.key().workspace_id == workspace_id)
            .map(|entry| entry.session.clone())
            .collect();
        sessions.sort_by_key(|s| s.actor_id);
        sessions
    }

    /// Number of live sessions across all workspaces.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Reminder state of a live session.
    pub fn reminder_phase(&self, workspace_id: WorkspaceId, actor_id: ActorId) -> Option<ReminderPhase> {
        self.sessions
            .get(&DutyKey::new(workspace_id, actor_id))
            .map(|active| active.probe.phase())
    }

    /// Acknowledge the moderator's outstanding probe.
    ///
    /// Returns false when there is nothing to acknowledge: no session, no
    /// probe outstanding, or the probe already timed out.
    pub async fn acknowledge(&self, workspace_id: WorkspaceId, actor_id: ActorId) -> bool {
        let resolved = self
            .sessions
            .get_mut(&DutyKey::new(workspace_id, actor_id))
            .is_some_and(|mut active| active.probe.resolve());
        if !resolved {
            return false;
        }

        debug!(workspace = %workspace_id, actor = %actor_id, "probe acknowledged");
        let channel = self.config.get(workspace_id).log_channel_id;
        notifier::dispatch(
            self.notifier.as_ref(),
            workspace_id,
            channel,
            Notification::ProbeConfirmed { actor_id },
        )
        .await;
        true
    }

    /// Operator switch for new probes. Live sessions are unaffected.
    pub fn set_reminders_enabled(&self, enabled: bool) {
        self.reminders_enabled.store(enabled, Ordering::SeqCst);
        info!(enabled, "liveness reminders toggled");
    }

    /// Whether new probes may be sent.
    pub fn reminders_enabled(&self) -> bool {
        self.reminders_enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub(crate) fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Arm a probe on the given session if it is still the live one and idle.
    pub(crate) fn begin_probe(
        &self,
        key: DutyKey,
        session_id: Uuid,
        probe_id: u64,
    ) -> Option<oneshot::Receiver<()>> {
        let mut active = self.sessions.get_mut(&key)?;
        if active.session.session_id != session_id {
            return None;
        }
        active.probe.arm(probe_id)
    }

    /// End the session on timeout if `probe_id` is still outstanding on it.
    ///
    /// Returns false when the acknowledgement won the race or the session
    /// is gone or restarted.
    pub(crate) async fn expire_probe(&self, key: DutyKey, session_id: Uuid, probe_id: u64) -> bool {
        let removed = self.sessions.remove_if(&key, |_, active| {
            active.session.session_id == session_id && active.probe.is_outstanding(probe_id)
        });
        match removed {
            Some((_, active)) => {
                self.finish(active, EndReason::Timeout).await;
                true
            }
            None => false,
        }
    }

    /// Book-keeping after a session left the map. The entry is owned here,
    /// so nothing else can observe a half-ended session.
    async fn finish(&self, active: ActiveSession, reason: EndReason) -> Duration {
        let ActiveSession {
            session,
            probe,
            _cancel: cancel,
        } = active;
        drop(cancel);
        drop(probe);

        let elapsed = session.elapsed();
        self.stats
            .record_duration(session.workspace_id, session.actor_id, elapsed);

        info!(
            workspace = %session.workspace_id,
            actor = %session.actor_id,
            session_id = %session.session_id,
            reason = reason.as_str(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "duty ended"
        );

        let channel = self.config.get(session.workspace_id).log_channel_id;
        notifier::dispatch(
            self.notifier.as_ref(),
            session.workspace_id,
            channel,
            Notification::DutyEnded {
                actor_id: session.actor_id,
                reason,
                elapsed,
            },
        )
        .await;
        elapsed
    }
}
