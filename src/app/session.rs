//! The broker session guarded by the session mutex.
//!
//! Bundles the client handle with the two device topics and the one-time
//! construction flag, so the session manager and the publisher always see
//! them together under one lock.

use core::time::Duration;

use super::events::OccupancyEvent;
use super::ports::{ConnectParams, Qos, ServiceStatus, SessionClient, SessionParams};
use crate::config::{NodeConfig, Topics};
use crate::error::SessionError;

/// QoS for inbound LED commands.
pub const COMMAND_QOS: Qos = Qos::AtMostOnce;
/// QoS for outbound occupancy events (never retained).
pub const EVENT_QOS: Qos = Qos::AtLeastOnce;

pub struct Session<C> {
    client: C,
    topics: Topics,
    initialized: bool,
}

impl<C: SessionClient> Session<C> {
    pub fn new(client: C, topics: Topics) -> Self {
        Self {
            client,
            topics,
            initialized: false,
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Construct the client's session object unless that already happened.
    pub fn init_once(&mut self, config: &NodeConfig) -> Result<(), SessionError> {
        if self.initialized {
            return Ok(());
        }
        self.client.init(&SessionParams {
            host: &config.broker_host,
            port: config.broker_port,
            command_timeout: Duration::from_millis(u64::from(config.command_timeout_ms)),
            tls_handshake_timeout: Duration::from_millis(u64::from(config.tls_handshake_timeout_ms)),
            verify_hostname: true,
            auto_reconnect: false,
        })?;
        self.initialized = true;
        Ok(())
    }

    /// Connect with a clean session and then hand reconnects to the client.
    pub fn connect(&mut self, config: &NodeConfig) -> Result<(), SessionError> {
        if !self.initialized {
            return Err(SessionError::NotInitialized);
        }
        self.client.connect(&ConnectParams {
            client_id: &config.client_id,
            keep_alive: Duration::from_secs(u64::from(config.keep_alive_secs)),
            clean_session: true,
        })?;
        self.client.set_auto_reconnect(true)
    }

    pub fn subscribe_commands(&mut self) -> Result<(), SessionError> {
        self.client.subscribe(&self.topics.command, COMMAND_QOS)
    }

    pub fn publish_event(&mut self, event: &OccupancyEvent) -> Result<(), SessionError> {
        let payload = event.to_payload().map_err(|_| SessionError::Encode)?;
        self.client.publish(&self.topics.event, &payload, EVENT_QOS)
    }

    pub fn service(
        &mut self,
        slice: Duration,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<ServiceStatus, SessionError> {
        self.client.service(slice, on_message)
    }
}
