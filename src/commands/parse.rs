//! Prefix command parsing.
//!
//! `!set-mod-roles <@&1> <@&2>` → [`Command::SetModRoles`]. Unknown command
//! names and plain chat are not commands and parse to `None`.

use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use crate::types::{ChannelId, Period, RoleId};

/// A recognised chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Go on duty.
    In,
    /// Go off duty.
    Out,
    /// Show one stats bucket without resetting it.
    Stats(Period),
    /// List commands.
    Help,
    /// Set the activity log channel.
    SetActivityLog(ChannelId),
    /// Set the message-deletion log channel.
    SetMessageLog(ChannelId),
    /// Set the forced-move log channel.
    SetVoiceLog(ChannelId),
    /// Replace the moderator roles.
    SetModRoles(Vec<RoleId>),
    /// Set the probe cadence for this workspace.
    SetReminderInterval(Duration),
    /// Set the acknowledgement window for this workspace.
    SetConfirmWindow(Duration),
}

impl Command {
    /// Whether the command changes workspace settings.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::SetActivityLog(_)
                | Self::SetMessageLog(_)
                | Self::SetVoiceLog(_)
                | Self::SetModRoles(_)
                | Self::SetReminderInterval(_)
                | Self::SetConfirmWindow(_)
        )
    }
}

/// Argument errors, reported back to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    /// A channel mention was required.
    #[error("Please mention a channel.")]
    MissingChannel,
    /// At least one role mention was required.
    #[error("Mention one or more mod roles.")]
    MissingRoles,
    /// A positive whole number was required.
    #[error("Please give a positive number of {0}.")]
    InvalidNumber(&'static str),
}

const CHANNEL_MENTION: &str = r"^<#(\d+)>$";
const ROLE_MENTION: &str = r"^<@&(\d+)>$";

/// Parse a chat message.
///
/// Returns `Ok(None)` when the text is not a known command.
///
/// # Errors
///
/// Returns a [`CommandError`] when a known command has bad arguments.
pub fn parse(prefix: &str, text: &str) -> Result<Option<Command>, CommandError> {
    let Some(rest) = text.trim_start().strip_prefix(prefix) else {
        return Ok(None);
    };
    let mut words = rest.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match name.to_lowercase().as_str() {
        "in" => Command::In,
        "out" => Command::Out,
        "daily" => Command::Stats(Period::Daily),
        "weekly" => Command::Stats(Period::Weekly),
        "monthly" => Command::Stats(Period::Monthly),
        "help" => Command::Help,
        "set-activity-log" => Command::SetActivityLog(first_channel(&args)?),
        "set-message-log" => Command::SetMessageLog(first_channel(&args)?),
        "set-voice-log" => Command::SetVoiceLog(first_channel(&args)?),
        "set-mod-roles" => {
            let roles: Vec<RoleId> = mentions(ROLE_MENTION, &args);
            if roles.is_empty() {
                return Err(CommandError::MissingRoles);
            }
            Command::SetModRoles(roles)
        }
        "set-reminder-interval" => {
            let minutes = positive_number(&args, "minutes")?;
            Command::SetReminderInterval(Duration::from_secs(minutes.saturating_mul(60)))
        }
        "set-confirm-window" => {
            Command::SetConfirmWindow(Duration::from_secs(positive_number(&args, "seconds")?))
        }
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn first_channel(args: &[&str]) -> Result<ChannelId, CommandError> {
    mentions(CHANNEL_MENTION, args)
        .into_iter()
        .next()
        .ok_or(CommandError::MissingChannel)
}

fn positive_number(args: &[&str], unit: &'static str) -> Result<u64, CommandError> {
    args.first()
        .and_then(|a| a.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .ok_or(CommandError::InvalidNumber(unit))
}

/// Ids extracted from every argument that is a mention of the given shape.
fn mentions<T: From<u64>>(pattern: &str, args: &[&str]) -> Vec<T> {
    let Ok(re) = Regex::new(pattern) else {
        return Vec::new();
    };
    args.iter()
        .filter_map(|arg| re.captures(arg))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
        .map(T::from)
        .collect()
}
