//! Session manager: owns connect, subscribe and service on the broker session.
//!
//! ```text
//!  Disconnected ──link up──▶ Initializing ──▶ Connecting ──▶ Subscribing ──▶ Ready
//!       ▲                                         ▲                           │
//!       │                                         └── readiness cleared ──────┤
//!       └──────────── link lost / service error ──────────────────────────────┘
//! ```
//!
//! Every client call happens with the session mutex held, and the mutex is
//! released before any backoff sleep. [`step`](SessionManager::step) runs
//! one locked section and returns the delay the loop should sleep next.

use std::sync::Arc;

use embassy_time::{Duration, Timer, with_timeout};
use embedded_hal::digital::OutputPin;
use log::{info, warn};

use super::{millis, report_session_error};
use crate::app::commands::CommandHandler;
use crate::app::events::OccupancyEvent;
use crate::app::ports::{ServiceStatus, SessionClient};
use crate::error::SessionError;
use crate::app::session::Session;
use crate::app::slots::SlotIndex;
use crate::context::NodeContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Initializing,
    Connecting,
    Subscribing,
    Ready,
}

pub struct SessionManager<C, L> {
    ctx: Arc<NodeContext<C, L>>,
    state: SessionState,
    /// Set once the startup snapshot went out; at most once per boot.
    snapshot_published: bool,
}

impl<C: SessionClient, L: OutputPin> SessionManager<C, L> {
    pub fn new(ctx: Arc<NodeContext<C, L>>) -> Self {
        Self {
            ctx,
            state: SessionState::Disconnected,
            snapshot_published: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn snapshot_published(&self) -> bool {
        self.snapshot_published
    }

    /// Advance the state machine by one locked section.
    ///
    /// Blocks while the link is down. Returns the backoff to sleep before
    /// the next step, or `None` to step again immediately.
    pub async fn step(&mut self) -> Option<Duration> {
        let ctx = Arc::clone(&self.ctx);
        let timing = ctx.config.session;

        if !ctx.readiness.is_link_up() {
            if self.state != SessionState::Disconnected {
                warn!("MQTT: link lost in {:?}, session down", self.state);
                ctx.readiness.clear_session_ready();
                self.state = SessionState::Disconnected;
            }
            ctx.readiness.wait_link_up().await;
            info!("MQTT: link up");
        }

        match self.state {
            SessionState::Disconnected => self.state = SessionState::Initializing,
            SessionState::Ready if !ctx.readiness.is_session_ready() => {
                warn!("MQTT: session readiness cleared, reconnecting");
                self.state = SessionState::Connecting;
            }
            _ => {}
        }

        let Ok(mut session) = with_timeout(millis(timing.mutex_timeout_ms), ctx.session.lock()).await else {
            warn!("MQTT: session mutex busy, retrying");
            return Some(millis(timing.lock_retry_ms));
        };

        if self.state == SessionState::Initializing {
            if let Err(e) = session.init_once(&ctx.config) {
                report_session_error("MQTT: session init failed", e);
                return Some(millis(timing.init_retry_ms));
            }
            self.state = SessionState::Connecting;
        }

        if self.state == SessionState::Connecting {
            info!("MQTT: connecting to {}:{}", ctx.config.broker_host, ctx.config.broker_port);
            if let Err(e) = session.connect(&ctx.config) {
                report_session_error("MQTT: connect failed", e);
                return Some(millis(timing.connect_retry_ms));
            }
            self.state = SessionState::Subscribing;
        }

        if self.state == SessionState::Subscribing {
            if let Err(e) = session.subscribe_commands() {
                report_session_error("MQTT: subscribe failed", e);
                self.state = SessionState::Connecting;
                return Some(millis(timing.connect_retry_ms));
            }
            self.state = SessionState::Ready;
            ctx.readiness.set_session_ready();
            info!("MQTT: ready, commands on {}", session.topics().command);

            if ctx.config.startup_snapshot && !self.snapshot_published {
                self.snapshot_published = publish_snapshot(&mut *session, &ctx.occupancy.snapshot());
            }
        }

        let handler = CommandHandler::new(&ctx.leds);
        let status = session.service(
            core::time::Duration::from_millis(u64::from(timing.service_slice_ms)),
            &mut |topic: &str, payload: &[u8]| {
                let _ = handler.handle(topic, payload);
            },
        );

        let resubscribed = match status {
            Ok(ServiceStatus::Reconnected) => Some(session.subscribe_commands()),
            _ => None,
        };
        drop(session);

        match (status, resubscribed) {
            (Ok(ServiceStatus::Idle), _) => Some(millis(timing.loop_backoff_ms)),
            (Ok(ServiceStatus::ReconnectInProgress), _) => {
                warn!("MQTT: reconnect in progress");
                Some(millis(timing.reconnect_poll_ms))
            }
            (Ok(ServiceStatus::Reconnected), Some(Ok(()))) => {
                info!("MQTT: reconnected, command subscription renewed");
                ctx.readiness.set_session_ready();
                Some(millis(timing.loop_backoff_ms))
            }
            (Ok(ServiceStatus::Reconnected), resubscribed) => {
                let e = match resubscribed {
                    Some(Err(e)) => e,
                    _ => SessionError::Disconnected,
                };
                report_session_error("MQTT: resubscribe after reconnect failed", e);
                // Ready with readiness cleared renegotiates on the next step.
                ctx.readiness.clear_session_ready();
                None
            }
            (Err(e), _) => {
                report_session_error("MQTT: service failed", e);
                ctx.readiness.clear_session_ready();
                self.state = SessionState::Disconnected;
                Some(millis(timing.service_fail_ms))
            }
        }
    }

    pub async fn run(mut self) {
        info!("MQTT: session manager started, waiting for link");
        loop {
            if let Some(backoff) = self.step().await {
                Timer::after(backoff).await;
            }
        }
    }
}

/// Publish the committed occupancy of every slot. Returns `true` when all
/// slots went out.
fn publish_snapshot<C: SessionClient>(session: &mut Session<C>, occupancy: &[bool]) -> bool {
    for (slot, &in_holder) in SlotIndex::all().zip(occupancy) {
        if let Err(e) = session.publish_event(&OccupancyEvent::new(slot, in_holder)) {
            report_session_error("MQTT: startup snapshot failed", e);
            return false;
        }
    }
    info!("MQTT: startup snapshot published {:?}", occupancy);
    true
}
