//! Outbound notifications to workspace log channels.
//!
//! The core never talks to the chat transport directly. It hands an
//! [`Outbound`] to a [`Notifier`] and moves on; delivery failures are logged
//! and otherwise ignored.

pub mod render;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::audit::Attribution;
use crate::stats::StatsReport;
use crate::types::{ActorId, ChannelId, EndReason, WorkspaceId};

/// Something the core wants a log channel to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A moderator went on duty.
    DutyStarted {
        /// Moderator now on duty.
        actor_id: ActorId,
    },
    /// A moderator went off duty.
    DutyEnded {
        /// Moderator now off duty.
        actor_id: ActorId,
        /// Manual sign-off or probe timeout.
        reason: EndReason,
        /// Length of the session that just ended.
        elapsed: Duration,
    },
    /// A liveness probe was sent and awaits acknowledgement.
    ProbeSent {
        /// Probed moderator.
        actor_id: ActorId,
        /// Time left to acknowledge.
        window: Duration,
    },
    /// A liveness probe was acknowledged in time.
    ProbeConfirmed {
        /// Moderator who acknowledged.
        actor_id: ActorId,
    },
    /// A side-effect event was attributed to a moderator.
    Attribution(Attribution),
    /// Periodic or on-demand stats report.
    Report(StatsReport),
}

/// A notification addressed to a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Workspace the channel belongs to.
    pub workspace_id: WorkspaceId,
    /// Destination channel.
    pub channel_id: ChannelId,
    /// What to show.
    pub notification: Notification,
}

/// Notifier delivery errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The transport side of the outbound channel is gone.
    #[error("outbound channel closed")]
    Closed,
    /// The transport is not keeping up; the notification was dropped.
    #[error("outbound queue full")]
    Full,
}

/// Sink for outbound notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    async fn deliver(&self, outbound: Outbound) -> Result<(), NotifyError>;
}

/// [`Notifier`] backed by a bounded mpsc channel drained by the transport.
///
/// Delivery never waits for queue space, so a slow transport cannot delay
/// probe deadlines.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<Outbound>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver the transport should drain.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn deliver(&self, outbound: Outbound) -> Result<(), NotifyError> {
        self.tx.try_send(outbound).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotifyError::Full,
            mpsc::error::TrySendError::Closed(_) => NotifyError::Closed,
        })
    }
}

/// Fire-and-forget delivery.
///
/// A missing channel means the feature is not configured and is skipped
/// silently; a delivery error is logged at `warn`.
pub async fn dispatch(
    notifier: &dyn Notifier,
    workspace_id: WorkspaceId,
    channel_id: Option<ChannelId>,
    notification: Notification,
) {
    let Some(channel_id) = channel_id else {
        debug!(workspace = %workspace_id, "no log channel configured, notification skipped");
        return;
    };

    let outbound = Outbound {
        workspace_id,
        channel_id,
        notification,
    };
    if let Err(e) = notifier.deliver(outbound).await {
        warn!(
            workspace = %workspace_id,
            channel = %channel_id,
            error = %e,
            "failed to deliver notification"
        );
    }
}
