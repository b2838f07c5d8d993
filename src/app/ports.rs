//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ tasks (domain)
//! ```
//!
//! Slot switches and LEDs are plain `embedded_hal::digital::{InputPin,
//! OutputPin}`; the only port this crate defines is the broker session,
//! [`SessionClient`]. The ESP-IDF adapter implements it on target and the
//! integration tests script it on the host.
//!
//! A `SessionClient` is never shared directly: it lives inside
//! [`Session`](super::session::Session) behind the session mutex, so every
//! call below is already serialised.

use core::time::Duration;

use crate::error::SessionError;

// ───────────────────────────────────────────────────────────────
// Session parameters
// ───────────────────────────────────────────────────────────────

/// MQTT delivery guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

/// One-time construction parameters for the session object.
#[derive(Debug, Clone, Copy)]
pub struct SessionParams<'a> {
    pub host: &'a str,
    pub port: u16,
    /// Bound on any single SDK request (connect, subscribe, publish ack).
    pub command_timeout: Duration,
    pub tls_handshake_timeout: Duration,
    pub verify_hostname: bool,
    /// Off at construction; enabled after the first successful connect.
    pub auto_reconnect: bool,
}

/// Parameters for each connect attempt.
#[derive(Debug, Clone, Copy)]
pub struct ConnectParams<'a> {
    pub client_id: &'a str,
    pub keep_alive: Duration,
    pub clean_session: bool,
}

/// Non-error outcomes of one service slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Normal slice; messages may have been dispatched.
    Idle,
    /// The client's own reconnect is running; poll again soon.
    ReconnectInProgress,
    /// The client reconnected by itself; subscriptions must be renewed.
    Reconnected,
}

// ───────────────────────────────────────────────────────────────
// Session client port (driven adapter: domain ↔ broker)
// ───────────────────────────────────────────────────────────────

/// Blocking MQTT client surface used by the session manager and publisher.
pub trait SessionClient: Send {
    /// Construct the underlying session object. Called once per boot.
    fn init(&mut self, params: &SessionParams<'_>) -> Result<(), SessionError>;

    fn connect(&mut self, params: &ConnectParams<'_>) -> Result<(), SessionError>;

    fn set_auto_reconnect(&mut self, enabled: bool) -> Result<(), SessionError>;

    fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), SessionError>;

    /// Publish and, for QoS 1, wait for the broker ack.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), SessionError>;

    /// Service the connection for at most `slice`, dispatching each inbound
    /// message to `on_message(topic, payload)`.
    fn service(
        &mut self,
        slice: Duration,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<ServiceStatus, SessionError>;
}
