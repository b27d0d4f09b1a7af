//! ModWatch: moderator duty tracking for community workspaces.
//!
//! Moderators clock in and out of duty, get periodic liveness reminders while
//! on duty, and have their moderation actions attributed to them by matching
//! side-effect events against the platform audit trail. Time on duty and
//! attributed actions roll up into daily, weekly and monthly reports.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod types;

pub mod audit;
pub mod duty;
pub mod notifier;
pub mod stats;

pub mod commands;
pub mod context;

pub mod adapters;
