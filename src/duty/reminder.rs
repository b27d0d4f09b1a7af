//! Liveness reminders for on-duty moderators.
//!
//! Every live session has one reminder task. After each reminder interval
//! the task arms a probe and asks the moderator to acknowledge within the
//! confirmation window:
//!
//! ```text
//! IDLE --interval--> PROBE_SENT --ack--> IDLE
//!                    PROBE_SENT --window--> session ended (timeout)
//! ```
//!
//! The acknowledgement and the timeout race on the same probe. The probe's
//! [`ProbeSlot`] lives in the session's registry entry and is consumed by
//! whichever side resolves it first, so the other side finds nothing to act
//! on. Ending the session drops its cancel sender, which stops the task
//! before any stale timeout can fire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

use crate::notifier::{self, Notification};
use crate::types::DutyKey;

use super::DutyRegistry;

static NEXT_PROBE_ID: AtomicU64 = AtomicU64::new(1);

/// Observable reminder state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderPhase {
    /// No probe outstanding.
    Idle,
    /// A probe awaits acknowledgement.
    ProbeSent,
}

/// Reminder state stored alongside a session.
#[derive(Debug)]
pub(crate) enum ProbeSlot {
    Idle,
    ProbeSent {
        probe_id: u64,
        ack: oneshot::Sender<()>,
    },
}

impl ProbeSlot {
    pub(crate) fn phase(&self) -> ReminderPhase {
        match self {
            Self::Idle => ReminderPhase::Idle,
            Self::ProbeSent { .. } => ReminderPhase::ProbeSent,
        }
    }

    /// Arm a new probe. At most one may be outstanding.
    pub(crate) fn arm(&mut self, probe_id: u64) -> Option<oneshot::Receiver<()>> {
        if matches!(self, Self::ProbeSent { .. }) {
            return None;
        }
        let (ack, rx) = oneshot::channel();
        *self = Self::ProbeSent { probe_id, ack };
        Some(rx)
    }

    /// Resolve the outstanding probe as acknowledged. Single use.
    pub(crate) fn resolve(&mut self) -> bool {
        match std::mem::replace(self, Self::Idle) {
            Self::ProbeSent { ack, .. } => {
                // The task may already be gone; the slot is idle either way.
                let _ = ack.send(());
                true
            }
            Self::Idle => false,
        }
    }

    pub(crate) fn is_outstanding(&self, id: u64) -> bool {
        matches!(self, Self::ProbeSent { probe_id, .. } if *probe_id == id)
    }
}

/// Reminder loop for one session. Exits when the session ends.
pub(crate) async fn run(
    registry: Arc<DutyRegistry>,
    key: DutyKey,
    session_id: Uuid,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    debug!(session = %key, %session_id, "reminder task started");

    loop {
        let interval = registry.config().get(key.workspace_id).reminder_interval;
        tokio::select! {
            _ = &mut cancel_rx => break,
            () = tokio::time::sleep(interval) => {}
        }

        if !registry.reminders_enabled() {
            continue;
        }
        let config = registry.config().get(key.workspace_id);
        let Some(channel) = config.log_channel_id else {
            continue;
        };

        let probe_id = NEXT_PROBE_ID.fetch_add(1, Ordering::Relaxed);
        let Some(ack_rx) = registry.begin_probe(key, session_id, probe_id) else {
            break;
        };

        info!(session = %key, probe_id, "liveness probe sent");
        notifier::dispatch(
            registry.notifier(),
            key.workspace_id,
            Some(channel),
            Notification::ProbeSent {
                actor_id: key.actor_id,
                window: config.confirmation_window,
            },
        )
        .await;

        tokio::select! {
            _ = &mut cancel_rx => break,
            ack = ack_rx => {
                if ack.is_err() {
                    break;
                }
            }
            () = tokio::time::sleep(config.confirmation_window) => {
                if registry.expire_probe(key, session_id, probe_id).await {
                    info!(session = %key, probe_id, "probe unanswered, session timed out");
                    break;
                }
                debug!(session = %key, probe_id, "timeout lost the race to an acknowledgement");
            }
        }
    }

    debug!(session = %key, %session_id, "reminder task stopped");
}
