//! Heuristic matching of side-effect events to audit trail entries.
//!
//! The matching policy lives in the pure [`match_entry`]; [`Correlator`]
//! wraps it with the platform lookups and the moderator-role check.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::ConfigStore;
use crate::types::ActorId;

use super::{
    AuditEntry, AuditQuery, AuditSource, Attribution, MembershipSource, SideEffect,
    SideEffectEvent,
};

/// Result of one correlation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationOutcome {
    /// A moderator was identified.
    Attributed(Attribution),
    /// No audit entry satisfied every predicate.
    Unattributed,
    /// The matched executor holds no moderator role (or is a bot).
    NotModerator(ActorId),
    /// The audit trail could not be read.
    SourceUnavailable,
    /// The workspace has no log channel or moderator roles for this kind.
    ConfigMissing,
    /// The event is never reported (bot-authored message).
    Ignored,
}

/// Select the first candidate satisfying every predicate of `query`.
///
/// Candidates are expected newest first; the first match wins with no
/// further disambiguation. An entry whose creation time is `window` or
/// more away from `now`, in either direction, is rejected.
pub fn match_entry<'a>(
    query: &AuditQuery,
    candidates: &'a [AuditEntry],
    now: DateTime<Utc>,
) -> Option<&'a AuditEntry> {
    candidates.iter().find(|entry| {
        if entry.kind != query.kind {
            return false;
        }
        if let Some(target) = query.target_id {
            if entry.target_id != Some(target) {
                return false;
            }
        }
        if let Some(channel) = query.channel_id {
            if entry.channel_id != Some(channel) {
                return false;
            }
        }
        within_window(entry.created_at, now, query.window)
    })
}

fn within_window(created_at: DateTime<Utc>, now: DateTime<Utc>, window: std::time::Duration) -> bool {
    let distance = now.signed_duration_since(created_at).abs();
    match distance.to_std() {
        Ok(distance) => distance < window,
        Err(_) => false,
    }
}

/// Identifies the moderator behind a side-effect event.
pub struct Correlator {
    config: Arc<ConfigStore>,
    audit: Arc<dyn AuditSource>,
    members: Arc<dyn MembershipSource>,
    fetch_limit: usize,
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlator")
            .field("fetch_limit", &self.fetch_limit)
            .finish_non_exhaustive()
    }
}

impl Correlator {
    /// Create a correlator over the given platform sources.
    pub fn new(
        config: Arc<ConfigStore>,
        audit: Arc<dyn AuditSource>,
        members: Arc<dyn MembershipSource>,
        fetch_limit: usize,
    ) -> Self {
        Self {
            config,
            audit,
            members,
            fetch_limit,
        }
    }

    /// Run one correlation attempt.
    ///
    /// Never fails: every failure mode maps to an outcome that the caller
    /// drops. Source failures are logged here.
    pub async fn correlate(&self, event: &SideEffectEvent) -> CorrelationOutcome {
        if let SideEffect::MessageDelete {
            author_is_bot: true,
            ..
        } = event.effect
        {
            return CorrelationOutcome::Ignored;
        }

        let config = self.config.get(event.workspace_id);
        if event.effect.log_channel(&config).is_none() || config.moderator_role_ids.is_empty() {
            return CorrelationOutcome::ConfigMissing;
        }

        let query = AuditQuery::for_event(&event.effect, config.correlation_window);
        let candidates = match self
            .audit
            .query(event.workspace_id, query.kind, self.fetch_limit)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    workspace = %event.workspace_id,
                    kind = query.kind.as_str(),
                    error = %e,
                    "audit trail query failed"
                );
                return CorrelationOutcome::SourceUnavailable;
            }
        };

        let Some(entry) = match_entry(&query, &candidates, event.occurred_at) else {
            debug!(
                workspace = %event.workspace_id,
                kind = query.kind.as_str(),
                candidates = candidates.len(),
                "event unattributed"
            );
            return CorrelationOutcome::Unattributed;
        };

        if entry.executor_is_bot {
            return CorrelationOutcome::NotModerator(entry.executor_id);
        }

        let roles = match self
            .members
            .resolve_roles(event.workspace_id, entry.executor_id)
            .await
        {
            Ok(roles) => roles,
            Err(e) => {
                warn!(
                    workspace = %event.workspace_id,
                    executor = %entry.executor_id,
                    error = %e,
                    "role lookup failed, treating executor as non-moderator"
                );
                return CorrelationOutcome::NotModerator(entry.executor_id);
            }
        };

        if !config.is_moderator(&roles) {
            debug!(
                workspace = %event.workspace_id,
                executor = %entry.executor_id,
                "executor holds no moderator role"
            );
            return CorrelationOutcome::NotModerator(entry.executor_id);
        }

        CorrelationOutcome::Attributed(Attribution {
            executor_id: entry.executor_id,
            event: event.clone(),
            attributed_at: Utc::now(),
        })
    }
}
