//! Adapters: transports that feed platform events into the engine.
//!
//! Each adapter turns its wire format into chat messages, reactions and
//! side-effect events for [`crate::context::ModContext`], and delivers the
//! rendered notifications the engine emits.

pub mod console;
