//! Process-wide context owning every core store.
//!
//! Transports hold one [`ModContext`] and feed it chat messages, reactions
//! and side-effect events. Nothing in the core lives in ambient module state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::audit::{AuditSource, CorrelationOutcome, Correlator, MembershipSource, SideEffectEvent};
use crate::config::{BotConfig, ConfigStore};
use crate::duty::DutyRegistry;
use crate::notifier::{self, Notification, Notifier};
use crate::stats::rollover::{self, RolloverDeps};
use crate::stats::StatsAggregator;
use crate::types::{ActorId, WorkspaceId};

/// Reaction that acknowledges a liveness probe.
pub const ACK_EMOJI: &str = "\u{2705}";

/// Shared engine state.
pub struct ModContext {
    /// Per-workspace settings.
    pub config: Arc<ConfigStore>,
    /// Who is on duty.
    pub registry: Arc<DutyRegistry>,
    /// Activity counters.
    pub stats: Arc<StatsAggregator>,
    /// Audit trail correlation.
    pub correlator: Arc<Correlator>,
    /// Outbound sink.
    pub notifier: Arc<dyn Notifier>,
    command_prefix: String,
}

impl std::fmt::Debug for ModContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModContext")
            .field("command_prefix", &self.command_prefix)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl ModContext {
    /// Wire up the engine from process config and platform collaborators.
    pub fn new(
        bot: &BotConfig,
        audit: Arc<dyn AuditSource>,
        members: Arc<dyn MembershipSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = Arc::new(ConfigStore::from_seeds(
            bot.defaults.clone(),
            &bot.workspaces,
        ));
        let stats = Arc::new(StatsAggregator::new());
        let registry = Arc::new(DutyRegistry::new(
            Arc::clone(&config),
            Arc::clone(&stats),
            Arc::clone(&notifier),
            bot.bot.reminders_enabled,
        ));
        let correlator = Arc::new(Correlator::new(
            Arc::clone(&config),
            audit,
            members,
            bot.defaults.audit_fetch_limit,
        ));

        Self {
            config,
            registry,
            stats,
            correlator,
            notifier,
            command_prefix: bot.bot.command_prefix.clone(),
        }
    }

    /// Prefix that marks chat text as a command.
    pub fn command_prefix(&self) -> &str {
        &self.command_prefix
    }

    /// A reaction was added to a message.
    ///
    /// Only the acknowledgement emoji from the probed moderator counts.
    pub async fn handle_reaction(
        &self,
        workspace_id: WorkspaceId,
        actor_id: ActorId,
        emoji: &str,
    ) -> bool {
        if emoji != ACK_EMOJI {
            return false;
        }
        self.registry.acknowledge(workspace_id, actor_id).await
    }

    /// Correlate a side-effect event on its own task.
    ///
    /// A verified attribution is counted for the moderator and posted to the
    /// event's log channel. Every other outcome is dropped.
    pub fn spawn_correlation(&self, event: SideEffectEvent) -> JoinHandle<CorrelationOutcome> {
        let correlator = Arc::clone(&self.correlator);
        let stats = Arc::clone(&self.stats);
        let config = Arc::clone(&self.config);
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            let outcome = correlator.correlate(&event).await;
            if let CorrelationOutcome::Attributed(attribution) = &outcome {
                stats.record_action(event.workspace_id, attribution.executor_id);
                info!(
                    workspace = %event.workspace_id,
                    executor = %attribution.executor_id,
                    kind = attribution.kind().as_str(),
                    "action attributed to moderator"
                );
                let channel = event.effect.log_channel(&config.get(event.workspace_id));
                notifier::dispatch(
                    notifier.as_ref(),
                    event.workspace_id,
                    channel,
                    Notification::Attribution(attribution.clone()),
                )
                .await;
            }
            outcome
        })
    }

    /// Dependencies for the rollover background loop.
    ///
    /// # Errors
    ///
    /// Returns an error if a rollover cron expression is invalid.
    pub fn rollover_deps(&self, bot: &BotConfig) -> anyhow::Result<RolloverDeps> {
        Ok(RolloverDeps {
            stats: Arc::clone(&self.stats),
            config: Arc::clone(&self.config),
            notifier: Arc::clone(&self.notifier),
            schedules: rollover::schedules_from_config(&bot.rollover)?,
            tick: Duration::from_secs(bot.rollover.tick_secs),
        })
    }
}
