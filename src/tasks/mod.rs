//! The three long-running node tasks.
//!
//! ```text
//!  GPIO ISR ──hint──▶ SensingTask ──OccupancyEvent──▶ PublisherTask
//!                        │ force LED off                   │ publish (QoS 1)
//!                        ▼                                 ▼
//!                     LedBank ◀──CommandHandler◀── SessionManager ◀──▶ broker
//! ```
//!
//! Each task is an async state machine over [`NodeContext`](crate::context::NodeContext).
//! On target every task gets its own core-pinned thread and is driven by
//! `futures_lite::future::block_on`. Tests call the single-iteration entry
//! points (`poll_once`, `publish_one`, `step`) directly.

pub mod publisher;
pub mod sensing;
pub mod session;

use embassy_time::Duration;
use log::{error, warn};

use crate::error::SessionError;

/// Config values are plain milliseconds.
pub(crate) fn millis(ms: u32) -> Duration {
    Duration::from_millis(u64::from(ms))
}

/// Log a session failure and, for provisioning faults, the operator hint.
pub(crate) fn report_session_error(what: &str, e: SessionError) {
    error!("{} ({})", what, e);
    if let Some(hint) = e.hint() {
        warn!("{}: {}", e.name(), hint);
    }
}
