//! Publisher task: drains the delivery queue into the broker session.
//!
//! An event taken off the queue is attempted once. Losing the session mutex
//! race or an ack timeout drops it; there is no redelivery.

use std::sync::Arc;

use embassy_time::{Timer, with_timeout};
use log::{info, warn};

use super::{millis, report_session_error};
use crate::app::events::OccupancyEvent;
use crate::app::ports::SessionClient;
use crate::error::SessionError;
use crate::context::NodeContext;

/// Result of one publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The broker acknowledged the event.
    Sent,
    /// The session mutex stayed held past the mutex timeout; event dropped.
    SessionBusy,
    /// Sent but not acknowledged in time; treated as possibly delivered.
    AckTimeout,
    /// Any other failure. Session readiness has been cleared.
    Failed(SessionError),
}

pub struct PublisherTask<C, L> {
    ctx: Arc<NodeContext<C, L>>,
}

impl<C: SessionClient, L> PublisherTask<C, L> {
    pub fn new(ctx: Arc<NodeContext<C, L>>) -> Self {
        Self { ctx }
    }

    /// Wait for session readiness, then publish `event` under the session
    /// mutex. The mutex is held for the publish call only.
    pub async fn publish_one(&self, event: OccupancyEvent) -> PublishOutcome {
        let ctx = &self.ctx;
        ctx.readiness.wait_session_ready().await;

        let result = {
            let Ok(mut session) = with_timeout(millis(ctx.config.session.mutex_timeout_ms), ctx.session.lock()).await
            else {
                warn!("PUB: session mutex timeout, dropped slot {} event", event.slot);
                return PublishOutcome::SessionBusy;
            };
            session.publish_event(&event)
        };

        match result {
            Ok(()) => {
                info!("PUB: slot {} in_holder={}", event.slot, event.in_holder);
                PublishOutcome::Sent
            }
            Err(SessionError::AckTimeout) => {
                warn!("PUB: slot {} ack timeout, not retrying", event.slot);
                PublishOutcome::AckTimeout
            }
            Err(e) => {
                report_session_error("PUB: publish failed", e);
                ctx.readiness.clear_session_ready();
                PublishOutcome::Failed(e)
            }
        }
    }

    pub async fn run(self) {
        let pause = millis(self.ctx.config.session.publish_fail_ms);
        loop {
            let event = self.ctx.delivery.dequeue().await;
            if let PublishOutcome::Failed(_) = self.publish_one(event).await {
                Timer::after(pause).await;
            }
        }
    }
}
