//! Console transport: JSON lines on stdin, rendered messages on stdout.
//!
//! Stands in for a chat platform during local runs and integration tests.
//! Each input line is one [`InboundEvent`]; audit entries and member roles in
//! the stream feed the [`InMemoryPlatform`] the correlator reads from.
//!
//! ```text
//! {"type":"roles","workspace_id":1,"actor_id":10,"roles":[5]}
//! {"type":"message","workspace_id":1,"channel_id":2,"author_id":10,"author_roles":[5],"content":"!in"}
//! {"type":"reaction","workspace_id":1,"actor_id":10,"emoji":"✅"}
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::audit::{AuditEntry, AuditKind, CorrelationOutcome, InMemoryPlatform, SideEffect, SideEffectEvent};
use crate::commands::{self, ChatMessage};
use crate::context::ModContext;
use crate::notifier::render::render;
use crate::notifier::Outbound;
use crate::types::{ActorId, ChannelId, RoleId, WorkspaceId};

/// One line of console input.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A chat message (possibly a command).
    Message(ChatMessage),
    /// A reaction added by a member.
    Reaction {
        /// Workspace.
        workspace_id: WorkspaceId,
        /// Member who reacted.
        actor_id: ActorId,
        /// Emoji name.
        emoji: String,
    },
    /// A side-effect event to correlate.
    SideEffect {
        /// Workspace.
        workspace_id: WorkspaceId,
        /// What happened.
        #[serde(flatten)]
        effect: SideEffect,
    },
    /// A new audit trail entry recorded by the platform.
    AuditEntry {
        /// Workspace.
        workspace_id: WorkspaceId,
        /// Action type.
        kind: AuditKind,
        /// Who did it.
        executor_id: ActorId,
        /// Whether the executor is a bot.
        #[serde(default)]
        executor_is_bot: bool,
        /// Member targeted.
        #[serde(default)]
        target_id: Option<ActorId>,
        /// Channel touched.
        #[serde(default)]
        channel_id: Option<ChannelId>,
    },
    /// Member roles changed.
    Roles {
        /// Workspace.
        workspace_id: WorkspaceId,
        /// Member.
        actor_id: ActorId,
        /// Roles now held.
        roles: BTreeSet<RoleId>,
    },
    /// Operator control.
    Operator {
        /// Global liveness reminder switch.
        reminders_enabled: bool,
    },
}

/// One line of console output.
#[derive(Debug, Serialize)]
struct OutputLine<'a> {
    workspace_id: WorkspaceId,
    channel_id: ChannelId,
    text: &'a str,
}

type SharedWriter<W> = Arc<Mutex<W>>;

/// Drive the engine from `input` until EOF.
///
/// Replies and notifications are written to `output` as JSON lines. On EOF
/// the transport waits for in-flight correlations and flushes queued
/// notifications before returning.
///
/// # Errors
///
/// Returns an error if reading input or writing output fails.
pub async fn run<R, W>(
    ctx: Arc<ModContext>,
    platform: Arc<InMemoryPlatform>,
    input: R,
    output: W,
    outbound_rx: mpsc::Receiver<Outbound>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer: SharedWriter<W> = Arc::new(Mutex::new(output));
    let (finish_tx, finish_rx) = oneshot::channel();
    let forwarder = tokio::spawn(forward_notifications(
        outbound_rx,
        Arc::clone(&writer),
        finish_rx,
    ));

    let mut correlations: Vec<JoinHandle<CorrelationOutcome>> = Vec::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: InboundEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "skipping malformed input line");
                continue;
            }
        };
        if let Some(handle) = handle_event(&ctx, &platform, event, &writer).await? {
            correlations.push(handle);
        }
        correlations.retain(|h| !h.is_finished());
    }

    for handle in correlations {
        if let Err(e) = handle.await {
            warn!(error = %e, "correlation task failed");
        }
    }

    let _ = finish_tx.send(());
    forwarder
        .await
        .context("notification forwarder panicked")??;
    Ok(())
}

async fn handle_event<W>(
    ctx: &ModContext,
    platform: &InMemoryPlatform,
    event: InboundEvent,
    writer: &SharedWriter<W>,
) -> anyhow::Result<Option<JoinHandle<CorrelationOutcome>>>
where
    W: AsyncWrite + Unpin,
{
    match event {
        InboundEvent::Message(msg) => {
            if let Some(reply) = commands::handle_message(ctx, &msg).await {
                write_line(writer, msg.workspace_id, msg.channel_id, &reply).await?;
            }
        }
        InboundEvent::Reaction {
            workspace_id,
            actor_id,
            emoji,
        } => {
            let acknowledged = ctx.handle_reaction(workspace_id, actor_id, &emoji).await;
            debug!(workspace = %workspace_id, actor = %actor_id, acknowledged, "reaction handled");
        }
        InboundEvent::SideEffect {
            workspace_id,
            effect,
        } => {
            let event = SideEffectEvent::now(workspace_id, effect);
            return Ok(Some(ctx.spawn_correlation(event)));
        }
        InboundEvent::AuditEntry {
            workspace_id,
            kind,
            executor_id,
            executor_is_bot,
            target_id,
            channel_id,
        } => platform.push_entry(
            workspace_id,
            AuditEntry {
                kind,
                executor_id,
                executor_is_bot,
                target_id,
                channel_id,
                created_at: Utc::now(),
            },
        ),
        InboundEvent::Roles {
            workspace_id,
            actor_id,
            roles,
        } => platform.set_roles(workspace_id, actor_id, roles),
        InboundEvent::Operator { reminders_enabled } => {
            ctx.registry.set_reminders_enabled(reminders_enabled);
        }
    }
    Ok(None)
}

async fn forward_notifications<W>(
    mut outbound_rx: mpsc::Receiver<Outbound>,
    writer: SharedWriter<W>,
    mut finish_rx: oneshot::Receiver<()>,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            out = outbound_rx.recv() => {
                let Some(out) = out else { return Ok(()) };
                write_outbound(&writer, &out).await?;
            }
            _ = &mut finish_rx => break,
        }
    }

    while let Ok(out) = outbound_rx.try_recv() {
        write_outbound(&writer, &out).await?;
    }
    Ok(())
}

async fn write_outbound<W>(writer: &SharedWriter<W>, out: &Outbound) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let text = render(&out.notification);
    write_line(writer, out.workspace_id, out.channel_id, &text).await
}

async fn write_line<W>(
    writer: &SharedWriter<W>,
    workspace_id: WorkspaceId,
    channel_id: ChannelId,
    text: &str,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut json = serde_json::to_string(&OutputLine {
        workspace_id,
        channel_id,
        text,
    })?;
    json.push('\n');
    let mut w = writer.lock().await;
    w.write_all(json.as_bytes())
        .await
        .context("failed to write output")?;
    w.flush().await.context("failed to flush output")?;
    Ok(())
}
