//! Side-effect events, the platform audit trail, and attribution records.
//!
//! The host platform reports that something happened (a message vanished,
//! a member was dragged to another voice channel) without saying who did it.
//! Its audit trail records administrative actions separately, with no causal
//! link to the event. The [`correlator`] bridges the two heuristically.

pub mod correlator;
pub mod memory;

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::WorkspaceConfig;
use crate::types::{ActorId, ChannelId, RoleId, WorkspaceId};

pub use correlator::{match_entry, CorrelationOutcome, Correlator};
pub use memory::InMemoryPlatform;

/// Audit trail action types the correlator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A single message was deleted by someone other than its author.
    MessageDelete,
    /// Several messages were deleted at once.
    BulkMessageDelete,
    /// A member was moved between voice channels.
    MemberMove,
}

impl AuditKind {
    /// Stable lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MessageDelete => "message_delete",
            Self::BulkMessageDelete => "bulk_message_delete",
            Self::MemberMove => "member_move",
        }
    }
}

/// Kind-specific payload of a side-effect event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    /// A message disappeared.
    MessageDelete {
        /// Author of the deleted message.
        author_id: ActorId,
        /// Whether the author is an automated account.
        #[serde(default)]
        author_is_bot: bool,
        /// Channel the message was in.
        channel_id: ChannelId,
        /// Cached content, if the transport still had it.
        #[serde(default)]
        content: Option<String>,
    },
    /// A batch of messages disappeared from one channel.
    BulkMessageDelete {
        /// Channel the messages were in.
        channel_id: ChannelId,
        /// Number of messages removed.
        count: u64,
    },
    /// A member was moved to another voice channel without asking.
    ForcedMove {
        /// Member who was moved.
        member_id: ActorId,
        /// Destination voice channel.
        channel_id: ChannelId,
    },
}

impl SideEffect {
    /// Audit trail kind to query for this event.
    pub fn kind(&self) -> AuditKind {
        match self {
            Self::MessageDelete { .. } => AuditKind::MessageDelete,
            Self::BulkMessageDelete { .. } => AuditKind::BulkMessageDelete,
            Self::ForcedMove { .. } => AuditKind::MemberMove,
        }
    }

    /// Target the audit entry must name, if the platform records one.
    ///
    /// Member moves are logged without a target, only the destination.
    pub fn match_target(&self) -> Option<ActorId> {
        match self {
            Self::MessageDelete { author_id, .. } => Some(*author_id),
            Self::BulkMessageDelete { .. } | Self::ForcedMove { .. } => None,
        }
    }

    /// Channel the audit entry must name.
    pub fn match_channel(&self) -> Option<ChannelId> {
        match self {
            Self::MessageDelete { channel_id, .. }
            | Self::BulkMessageDelete { channel_id, .. }
            | Self::ForcedMove { channel_id, .. } => Some(*channel_id),
        }
    }

    /// Member affected by the event, for reporting.
    pub fn subject(&self) -> Option<ActorId> {
        match self {
            Self::MessageDelete { author_id, .. } => Some(*author_id),
            Self::ForcedMove { member_id, .. } => Some(*member_id),
            Self::BulkMessageDelete { .. } => None,
        }
    }

    /// Log channel that receives attributions of this kind.
    pub fn log_channel(&self, config: &WorkspaceConfig) -> Option<ChannelId> {
        match self.kind() {
            AuditKind::MessageDelete | AuditKind::BulkMessageDelete => {
                config.message_log_channel_id
            }
            AuditKind::MemberMove => config.voice_log_channel_id,
        }
    }
}

/// A raw side-effect event raised by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideEffectEvent {
    /// Workspace it happened in.
    pub workspace_id: WorkspaceId,
    /// What happened.
    #[serde(flatten)]
    pub effect: SideEffect,
    /// When the transport observed it.
    pub occurred_at: DateTime<Utc>,
}

impl SideEffectEvent {
    /// Event observed right now.
    pub fn now(workspace_id: WorkspaceId, effect: SideEffect) -> Self {
        Self {
            workspace_id,
            effect,
            occurred_at: Utc::now(),
        }
    }
}

/// Predicates a candidate audit entry must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditQuery {
    /// Required entry kind.
    pub kind: AuditKind,
    /// Required target, when the event names one.
    pub target_id: Option<ActorId>,
    /// Required channel, when the event names one.
    pub channel_id: Option<ChannelId>,
    /// Maximum distance between event and entry, exclusive.
    pub window: Duration,
}

impl AuditQuery {
    /// Build the query for an event.
    pub fn for_event(effect: &SideEffect, window: Duration) -> Self {
        Self {
            kind: effect.kind(),
            target_id: effect.match_target(),
            channel_id: effect.match_channel(),
            window,
        }
    }
}

/// One record from the platform audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Action type.
    pub kind: AuditKind,
    /// Who performed the action.
    pub executor_id: ActorId,
    /// Whether the executor is an automated account.
    #[serde(default)]
    pub executor_is_bot: bool,
    /// Member the action targeted.
    #[serde(default)]
    pub target_id: Option<ActorId>,
    /// Channel the action touched.
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// When the platform recorded it.
    pub created_at: DateTime<Utc>,
}

/// A verified claim that a moderator caused an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    /// Moderator responsible.
    pub executor_id: ActorId,
    /// The event being attributed.
    pub event: SideEffectEvent,
    /// When the attribution was made.
    pub attributed_at: DateTime<Utc>,
}

impl Attribution {
    /// Kind of the attributed event.
    pub fn kind(&self) -> AuditKind {
        self.event.effect.kind()
    }

    /// Member affected, if any.
    pub fn target_id(&self) -> Option<ActorId> {
        self.event.effect.subject()
    }

    /// Channel involved.
    pub fn channel_id(&self) -> Option<ChannelId> {
        self.event.effect.match_channel()
    }
}

/// Failures of the platform-side lookups.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The platform could not be reached or refused the request.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Read access to a workspace's audit trail.
#[async_trait]
pub trait AuditSource: Send + Sync {
    /// Most recent entries of `kind`, newest first, at most `limit`.
    async fn query(
        &self,
        workspace_id: WorkspaceId,
        kind: AuditKind,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, SourceError>;
}

/// Read access to member roles.
#[async_trait]
pub trait MembershipSource: Send + Sync {
    /// Roles currently held by `actor_id`.
    async fn resolve_roles(
        &self,
        workspace_id: WorkspaceId,
        actor_id: ActorId,
    ) -> Result<BTreeSet<RoleId>, SourceError>;
}
