//! In-process platform double for the audit and membership sources.
//!
//! The console transport feeds it from the event stream; tests use it to
//! script audit trails and simulate outages.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;

use crate::types::{ActorId, RoleId, WorkspaceId};

use super::{AuditEntry, AuditKind, AuditSource, MembershipSource, SourceError};

/// Entries retained per workspace.
const RETAINED_ENTRIES: usize = 100;

/// Audit trail and member roles held in memory.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    trails: Mutex<HashMap<WorkspaceId, VecDeque<AuditEntry>>>,
    roles: DashMap<(WorkspaceId, ActorId), BTreeSet<RoleId>>,
    audit_down: AtomicBool,
    members_down: AtomicBool,
}

impl InMemoryPlatform {
    /// Empty platform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; it becomes the newest in the trail.
    pub fn push_entry(&self, workspace_id: WorkspaceId, entry: AuditEntry) {
        match self.trails.lock() {
            Ok(mut trails) => {
                let trail = trails.entry(workspace_id).or_default();
                trail.push_front(entry);
                trail.truncate(RETAINED_ENTRIES);
            }
            Err(e) => warn!(
                workspace = %workspace_id,
                kind = ?entry.kind,
                error = %e,
                "audit trail lock poisoned, entry dropped"
            ),
        }
    }

    /// Replace the roles held by a member.
    pub fn set_roles(
        &self,
        workspace_id: WorkspaceId,
        actor_id: ActorId,
        roles: impl IntoIterator<Item = RoleId>,
    ) {
        self.roles
            .insert((workspace_id, actor_id), roles.into_iter().collect());
    }

    /// Make audit queries fail until toggled back.
    pub fn set_audit_unavailable(&self, down: bool) {
        self.audit_down.store(down, Ordering::SeqCst);
    }

    /// Make role lookups fail until toggled back.
    pub fn set_membership_unavailable(&self, down: bool) {
        self.members_down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditSource for InMemoryPlatform {
    async fn query(
        &self,
        workspace_id: WorkspaceId,
        kind: AuditKind,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, SourceError> {
        if self.audit_down.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("audit trail offline".to_owned()));
        }
        let trails = self
            .trails
            .lock()
            .map_err(|e| SourceError::Unavailable(format!("lock poisoned: {e}")))?;
        Ok(trails
            .get(&workspace_id)
            .map(|trail| {
                trail
                    .iter()
                    .filter(|entry| entry.kind == kind)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl MembershipSource for InMemoryPlatform {
    async fn resolve_roles(
        &self,
        workspace_id: WorkspaceId,
        actor_id: ActorId,
    ) -> Result<BTreeSet<RoleId>, SourceError> {
        if self.members_down.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("member lookup offline".to_owned()));
        }
        Ok(self
            .roles
            .get(&(workspace_id, actor_id))
            .map(|roles| roles.value().clone())
            .unwrap_or_default())
    }
}
