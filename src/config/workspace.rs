//! Per-workspace settings.
//!
//! The [`ConfigStore`] is read synchronously by the core. A workspace that
//! was never configured reads back as defaults with no channels and no
//! moderator roles, which every feature treats as "disabled".

use std::collections::BTreeSet;
use std::time::Duration;

use dashmap::DashMap;

use crate::types::{ChannelId, RoleId, WorkspaceId};

use super::{TimingDefaults, WorkspaceSeed};

/// Settings for a single workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    /// Activity log: duty changes, probes and reports.
    pub log_channel_id: Option<ChannelId>,
    /// Message deletion attributions.
    pub message_log_channel_id: Option<ChannelId>,
    /// Forced-move attributions.
    pub voice_log_channel_id: Option<ChannelId>,
    /// Holding any of these roles makes a member a moderator.
    pub moderator_role_ids: BTreeSet<RoleId>,
    /// Delay between liveness probes.
    pub reminder_interval: Duration,
    /// Acknowledgement window for a probe.
    pub confirmation_window: Duration,
    /// Maximum distance between an event and its audit entry.
    pub correlation_window: Duration,
}

impl WorkspaceConfig {
    /// Unconfigured workspace using the given timing defaults.
    pub fn with_defaults(defaults: &TimingDefaults) -> Self {
        Self {
            log_channel_id: None,
            message_log_channel_id: None,
            voice_log_channel_id: None,
            moderator_role_ids: BTreeSet::new(),
            reminder_interval: Duration::from_secs(defaults.reminder_interval_secs),
            confirmation_window: Duration::from_secs(defaults.confirmation_window_secs),
            correlation_window: Duration::from_millis(defaults.correlation_window_ms),
        }
    }

    /// Whether a member holding `roles` counts as a moderator here.
    ///
    /// Always false when no moderator roles are configured.
    pub fn is_moderator<'a>(&self, roles: impl IntoIterator<Item = &'a RoleId>) -> bool {
        roles
            .into_iter()
            .any(|role| self.moderator_role_ids.contains(role))
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self::with_defaults(&TimingDefaults::default())
    }
}

/// Workspace settings keyed by workspace id.
#[derive(Debug)]
pub struct ConfigStore {
    workspaces: DashMap<WorkspaceId, WorkspaceConfig>,
    defaults: TimingDefaults,
}

impl ConfigStore {
    /// Empty store; every workspace reads as unconfigured.
    pub fn new(defaults: TimingDefaults) -> Self {
        Self {
            workspaces: DashMap::new(),
            defaults,
        }
    }

    /// Store pre-populated from `[[workspaces]]` tables.
    pub fn from_seeds(defaults: TimingDefaults, seeds: &[WorkspaceSeed]) -> Self {
        let store = Self::new(defaults);
        for seed in seeds {
            store.update(seed.id, |cfg| {
                cfg.log_channel_id = seed.log_channel;
                cfg.message_log_channel_id = seed.message_log_channel;
                cfg.voice_log_channel_id = seed.voice_log_channel;
                cfg.moderator_role_ids = seed.moderator_roles.iter().copied().collect();
                // Zero overrides are rejected by validation; never apply one.
                if let Some(secs) = seed.reminder_interval_secs.filter(|&s| s > 0) {
                    cfg.reminder_interval = Duration::from_secs(secs);
                }
                if let Some(secs) = seed.confirmation_window_secs.filter(|&s| s > 0) {
                    cfg.confirmation_window = Duration::from_secs(secs);
                }
                if let Some(ms) = seed.correlation_window_ms.filter(|&ms| ms > 0) {
                    cfg.correlation_window = Duration::from_millis(ms);
                }
            });
        }
        store
    }

    /// Snapshot of a workspace's settings.
    pub fn get(&self, workspace_id: WorkspaceId) -> WorkspaceConfig {
        self.workspaces
            .get(&workspace_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| WorkspaceConfig::with_defaults(&self.defaults))
    }

    /// Mutate a workspace's settings atomically, creating them if needed.
    pub fn update<R>(
        &self,
        workspace_id: WorkspaceId,
        f: impl FnOnce(&mut WorkspaceConfig) -> R,
    ) -> R {
        let mut entry = self
            .workspaces
            .entry(workspace_id)
            .or_insert_with(|| WorkspaceConfig::with_defaults(&self.defaults));
        f(entry.value_mut())
    }

    /// Every workspace that has been configured at least once, sorted.
    pub fn workspace_ids(&self) -> Vec<WorkspaceId> {
        let mut ids: Vec<WorkspaceId> = self.workspaces.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(TimingDefaults::default())
    }
}
