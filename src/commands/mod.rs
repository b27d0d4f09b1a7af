//! Chat command handlers.
//!
//! Each handler returns the plain-text reply for the caller. Setup commands
//! require the manage-workspace permission; duty commands require a
//! configured moderator role.

pub mod parse;

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::debug;

use crate::context::ModContext;
use crate::duty::DutyError;
use crate::notifier::render::{self, mention_channel};
use crate::notifier::Notification;
use crate::types::{ActorId, ChannelId, EndReason, Period, RoleId, WorkspaceId};

pub use parse::{parse, Command, CommandError};

/// A chat message as seen by the command layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    /// Workspace it was posted in.
    pub workspace_id: WorkspaceId,
    /// Channel it was posted in.
    pub channel_id: ChannelId,
    /// Author.
    pub author_id: ActorId,
    /// Whether the author is an automated account.
    #[serde(default)]
    pub author_is_bot: bool,
    /// Roles the author holds.
    #[serde(default)]
    pub author_roles: BTreeSet<RoleId>,
    /// Whether the author may manage the workspace.
    #[serde(default)]
    pub can_manage: bool,
    /// Raw text.
    pub content: String,
}

const NO_PERMISSION: &str = "You need **Manage Server** permission.";
const NOT_MODERATOR: &str = "\u{274C} You are not a moderator.";

/// Handle a chat message. Returns the reply, or `None` if it was not a
/// command or came from a bot.
pub async fn handle_message(ctx: &ModContext, msg: &ChatMessage) -> Option<String> {
    if msg.author_is_bot {
        return None;
    }

    let command = match parse(ctx.command_prefix(), &msg.content) {
        Ok(Some(command)) => command,
        Ok(None) => return None,
        Err(e) if !msg.can_manage && is_setup_name(ctx.command_prefix(), &msg.content) => {
            debug!(error = %e, "rejecting setup command from non-manager");
            return Some(NO_PERMISSION.to_owned());
        }
        Err(e) => return Some(e.to_string()),
    };

    debug!(
        workspace = %msg.workspace_id,
        author = %msg.author_id,
        ?command,
        "command received"
    );

    if command.is_setup() && !msg.can_manage {
        return Some(NO_PERMISSION.to_owned());
    }

    let reply = match command {
        Command::In => handle_in(ctx, msg).await,
        Command::Out => handle_out(ctx, msg).await,
        Command::Stats(period) => handle_stats(ctx, msg.workspace_id, period),
        Command::Help => handle_help(ctx.command_prefix()),
        Command::SetActivityLog(channel) => {
            ctx.config
                .update(msg.workspace_id, |cfg| cfg.log_channel_id = Some(channel));
            format!("\u{2705} Activity log channel set to {}", mention_channel(channel))
        }
        Command::SetMessageLog(channel) => {
            ctx.config
                .update(msg.workspace_id, |cfg| cfg.message_log_channel_id = Some(channel));
            format!("\u{2705} Message log channel set to {}", mention_channel(channel))
        }
        Command::SetVoiceLog(channel) => {
            ctx.config
                .update(msg.workspace_id, |cfg| cfg.voice_log_channel_id = Some(channel));
            format!("\u{2705} Voice log channel set to {}", mention_channel(channel))
        }
        Command::SetModRoles(roles) => {
            ctx.config.update(msg.workspace_id, |cfg| {
                cfg.moderator_role_ids = roles.into_iter().collect();
            });
            "\u{2705} Moderator roles set.".to_owned()
        }
        Command::SetReminderInterval(interval) => {
            ctx.config
                .update(msg.workspace_id, |cfg| cfg.reminder_interval = interval);
            format!(
                "\u{2705} Reminder interval set to {}.",
                render::format_duration(interval)
            )
        }
        Command::SetConfirmWindow(window) => {
            ctx.config
                .update(msg.workspace_id, |cfg| cfg.confirmation_window = window);
            format!(
                "\u{2705} Confirmation window set to {}.",
                render::format_duration(window)
            )
        }
    };
    Some(reply)
}

/// Check the caller's moderator role against the workspace config.
fn ensure_moderator(ctx: &ModContext, msg: &ChatMessage) -> Result<(), DutyError> {
    if ctx.config.get(msg.workspace_id).is_moderator(&msg.author_roles) {
        Ok(())
    } else {
        Err(DutyError::NotModerator(msg.author_id))
    }
}

async fn handle_in(ctx: &ModContext, msg: &ChatMessage) -> String {
    if ensure_moderator(ctx, msg).is_err() {
        return NOT_MODERATOR.to_owned();
    }
    match ctx
        .registry
        .start_session(msg.workspace_id, msg.author_id)
        .await
    {
        Ok(_) => "You are now **ON DUTY**.".to_owned(),
        Err(DutyError::AlreadyActive { .. }) => "You are already **ON DUTY**.".to_owned(),
        Err(DutyError::NotModerator(_)) => NOT_MODERATOR.to_owned(),
    }
}

async fn handle_out(ctx: &ModContext, msg: &ChatMessage) -> String {
    if ensure_moderator(ctx, msg).is_err() {
        return NOT_MODERATOR.to_owned();
    }
    match ctx
        .registry
        .end_session(msg.workspace_id, msg.author_id, EndReason::Manual)
        .await
    {
        Some(elapsed) => format!(
            "You are now **OFF DUTY**. Session: {}",
            render::format_duration(elapsed)
        ),
        None => "You are not on duty.".to_owned(),
    }
}

/// Current values of one bucket, without resetting anything.
pub fn handle_stats(ctx: &ModContext, workspace_id: WorkspaceId, period: Period) -> String {
    let report = ctx.stats.report(workspace_id, period);
    render::render(&Notification::Report(report))
}

/// List all available commands.
pub fn handle_help(prefix: &str) -> String {
    [
        "**\u{1F6E0}\u{FE0F} ModWatch Commands**".to_owned(),
        String::new(),
        format!("**Activity:** {prefix}in, {prefix}out, {prefix}daily, {prefix}weekly, {prefix}monthly"),
        format!(
            "**Setup:** {prefix}set-activity-log #ch, {prefix}set-message-log #ch, \
             {prefix}set-voice-log #ch, {prefix}set-mod-roles @role..."
        ),
        format!("**Reminders:** {prefix}set-reminder-interval <minutes>, {prefix}set-confirm-window <seconds>"),
        format!("**Other:** {prefix}help"),
    ]
    .join("\n")
}

/// Whether the text names a setup command, regardless of its arguments.
fn is_setup_name(prefix: &str, text: &str) -> bool {
    text.trim_start()
        .strip_prefix(prefix)
        .and_then(|rest| rest.split_whitespace().next())
        .is_some_and(|name| name.to_lowercase().starts_with("set-"))
}
