//! Identifier newtypes and small shared enums.
//!
//! Platform identifiers are opaque 64-bit snowflakes. They are wrapped in
//! distinct newtypes so a channel id can never be passed where a role id is
//! expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

snowflake!(
    /// An isolated community the bot operates in (a "guild").
    WorkspaceId
);
snowflake!(
    /// Any platform member.
    ActorId
);
snowflake!(
    /// A text or voice channel inside a workspace.
    ChannelId
);
snowflake!(
    /// A role that can be granted to members.
    RoleId
);

/// Registry key: one live session per (workspace, actor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DutyKey {
    /// Workspace the session belongs to.
    pub workspace_id: WorkspaceId,
    /// Moderator on duty.
    pub actor_id: ActorId,
}

impl DutyKey {
    /// Build a key from its parts.
    pub fn new(workspace_id: WorkspaceId, actor_id: ActorId) -> Self {
        Self {
            workspace_id,
            actor_id,
        }
    }
}

impl fmt::Display for DutyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace_id, self.actor_id)
    }
}

/// Why a duty session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The moderator went off duty themselves.
    Manual,
    /// A liveness probe went unanswered.
    Timeout,
}

impl EndReason {
    /// Stable lowercase name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Timeout => "timeout",
        }
    }
}

/// Rollover cadence of a stats bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Reset once per calendar day.
    Daily,
    /// Reset once per week.
    Weekly,
    /// Reset once per month.
    Monthly,
}

impl Period {
    /// All cadences in rollover order.
    pub const ALL: [Period; 3] = [Period::Daily, Period::Weekly, Period::Monthly];

    /// Lowercase name (matches the stats command names).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Capitalised name for report headers.
    pub fn title(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
