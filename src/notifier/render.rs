//! Plain-text rendering of notifications using platform mention syntax.

use std::fmt::Write as _;
use std::time::Duration;

use crate::audit::{Attribution, SideEffect};
use crate::stats::{ReportTrigger, StatsReport};
use crate::types::{ActorId, ChannelId, EndReason};

use super::Notification;

/// Mention a member: `<@id>`.
pub fn mention_actor(id: ActorId) -> String {
    format!("<@{id}>")
}

/// Mention a channel: `<#id>`.
pub fn mention_channel(id: ChannelId) -> String {
    format!("<#{id}>")
}

/// Format a duration as `{h}h {m}m {s}s`, truncating sub-second parts.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

/// Human phrasing for a probe window ("2 minutes", "45 seconds").
fn format_window(d: Duration) -> String {
    let secs = d.as_secs();
    match secs {
        60 => "1 minute".to_owned(),
        s if s >= 60 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_owned(),
        s => format!("{s} seconds"),
    }
}

/// Render a notification as the message body sent to a log channel.
pub fn render(notification: &Notification) -> String {
    match notification {
        Notification::DutyStarted { actor_id } => {
            format!("\u{1F7E2} {} is now **ON DUTY**.", mention_actor(*actor_id))
        }
        Notification::DutyEnded {
            actor_id,
            reason,
            elapsed,
        } => {
            let suffix = match reason {
                EndReason::Manual => "",
                EndReason::Timeout => " (timed out)",
            };
            format!(
                "\u{1F534} {} is now **OFF DUTY**{suffix}. Session: {}",
                mention_actor(*actor_id),
                format_duration(*elapsed)
            )
        }
        Notification::ProbeSent { actor_id, window } => format!(
            "\u{1F514} Hey {}, are you still active? React with \u{2705} within {} to stay active.",
            mention_actor(*actor_id),
            format_window(*window)
        ),
        Notification::ProbeConfirmed { actor_id } => {
            format!("\u{2705} {} confirmed active.", mention_actor(*actor_id))
        }
        Notification::Attribution(attribution) => render_attribution(attribution),
        Notification::Report(report) => render_report(report),
    }
}

fn render_attribution(attribution: &Attribution) -> String {
    let moderator = mention_actor(attribution.executor_id);
    let at = attribution.attributed_at.format("%Y-%m-%d %H:%M:%S UTC");
    match &attribution.event.effect {
        SideEffect::MessageDelete {
            author_id,
            channel_id,
            content,
            ..
        } => {
            let content = match content.as_deref() {
                Some(c) if !c.is_empty() => c,
                _ => "_(No content)_",
            };
            format!(
                "\u{1F5D1}\u{FE0F} **Message Deleted by Moderator**\n\
                 Moderator: {moderator}\n\
                 Original Author: {}\n\
                 Channel: {}\n\
                 Content: {content}\n\
                 At: {at}",
                mention_actor(*author_id),
                mention_channel(*channel_id),
            )
        }
        SideEffect::BulkMessageDelete { channel_id, count } => format!(
            "\u{1F9F9} **Messages Bulk Deleted by Moderator**\n\
             Moderator: {moderator}\n\
             Channel: {}\n\
             Messages: {count}\n\
             At: {at}",
            mention_channel(*channel_id),
        ),
        SideEffect::ForcedMove {
            member_id,
            channel_id,
        } => format!(
            "\u{1F500} **Member Moved by Moderator**\n\
             Moderator: {moderator}\n\
             Member: {}\n\
             To: {}\n\
             At: {at}",
            mention_actor(*member_id),
            mention_channel(*channel_id),
        ),
    }
}

fn render_report(report: &StatsReport) -> String {
    let mut out = match report.trigger {
        ReportTrigger::Rollover => format!(
            "\u{1F4CA} **{} Mod Stats for {}**\n",
            report.period.title(),
            report.generated_at.format("%Y-%m-%d")
        ),
        ReportTrigger::OnDemand => format!("\u{1F4C6} **{} Stats**\n", report.period.title()),
    };

    if report.rows.is_empty() {
        out.push_str("No data.");
        return out;
    }

    for row in &report.rows {
        let _ = write!(
            out,
            "\u{2022} {} \u{2014} {}",
            mention_actor(row.actor_id),
            format_duration(row.active)
        );
        if row.actions > 0 {
            let noun = if row.actions == 1 { "action" } else { "actions" };
            let _ = write!(out, " ({} {noun})", row.actions);
        }
        out.push('\n');
    }
    out
}
