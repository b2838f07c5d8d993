//! Node configuration parameters
//!
//! All tunable parameters for the PillBuddy node. Defaults match the
//! shipped firmware; flash builds override identity, broker and Wi-Fi
//! settings from the build environment (see [`NodeConfig::from_build_env`]).

use core::fmt::Write as _;

use heapless::String;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::slots::Level;
use crate::error::ConfigError;

/// Capacity of each derived topic string.
pub const TOPIC_CAPACITY: usize = 128;

pub type Topic = String<TOPIC_CAPACITY>;

/// Fixed delays of the session manager and publisher, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTiming {
    /// Bound on acquiring the session mutex.
    pub mutex_timeout_ms: u32,
    /// Pause after a failed connect or subscribe.
    pub connect_retry_ms: u32,
    /// Pause after failed session construction.
    pub init_retry_ms: u32,
    /// Pause when the session mutex was busy.
    pub lock_retry_ms: u32,
    /// Publisher pause after a non-timeout publish failure.
    pub publish_fail_ms: u32,
    /// Pause after a failed service slice.
    pub service_fail_ms: u32,
    /// Length of one service slice.
    pub service_slice_ms: u32,
    /// Sleep after each slice so the publisher can take the mutex.
    pub loop_backoff_ms: u32,
    /// Re-poll interval while the client reconnects by itself.
    pub reconnect_poll_ms: u32,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            mutex_timeout_ms: 2000,
            connect_retry_ms: 1500,
            init_retry_ms: 1000,
            lock_retry_ms: 200,
            publish_fail_ms: 500,
            service_fail_ms: 400,
            service_slice_ms: 50,
            loop_backoff_ms: 25,
            reconnect_poll_ms: 100,
        }
    }
}

/// Sensing task timing, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensingTiming {
    /// Longest wait for an interrupt hint before re-sampling anyway.
    pub hint_wait_ms: u32,
    /// Longest wait for room in the delivery queue.
    pub enqueue_timeout_ms: u32,
}

impl Default for SensingTiming {
    fn default() -> Self {
        Self {
            hint_wait_ms: 50,
            enqueue_timeout_ms: 100,
        }
    }
}

/// Core node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Identity / topics ---
    pub device_id: String<64>,
    pub event_topic_base: String<64>,
    pub command_topic_base: String<64>,
    pub client_id: String<64>,

    // --- Broker ---
    pub broker_host: String<128>,
    pub broker_port: u16,
    pub keep_alive_secs: u16,
    /// SDK bound on a single request (connect, subscribe, publish ack).
    pub command_timeout_ms: u32,
    pub tls_handshake_timeout_ms: u32,

    // --- Slots ---
    pub debounce_ms: u32,
    /// Switch level that means "bottle present".
    pub holder_level: Level,
    pub switch_internal_pullup: bool,
    /// LED state driven at boot (lamp test).
    pub leds_on_at_boot: bool,
    /// Publish every slot's occupancy once after the first session is up.
    pub startup_snapshot: bool,

    // --- Wi-Fi ---
    pub wifi_ssid: String<32>,
    #[serde(skip_serializing, default)]
    pub wifi_password: String<64>,

    // --- Timing ---
    pub session: SessionTiming,
    pub sensing: SensingTiming,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: fixed("pillbuddy-001"),
            event_topic_base: fixed("pillbuddy/events"),
            command_topic_base: fixed("pillbuddy/cmd"),
            client_id: fixed("pillbuddy-001"),

            broker_host: fixed("mqtt.local"),
            broker_port: 8883,
            keep_alive_secs: 10,
            command_timeout_ms: 20_000,
            tls_handshake_timeout_ms: 5_000,

            debounce_ms: 50,
            holder_level: Level::Low, // switch closes to ground when seated
            switch_internal_pullup: true,
            leds_on_at_boot: true,
            startup_snapshot: true,

            wifi_ssid: String::new(),
            wifi_password: String::new(),

            session: SessionTiming::default(),
            sensing: SensingTiming::default(),
        }
    }
}

impl NodeConfig {
    /// Defaults overridden by build-time environment variables.
    ///
    /// Values that do not fit or do not parse are ignored with a warning.
    pub fn from_build_env() -> Self {
        let mut c = Self::default();
        override_str(&mut c.device_id, "PILLBUDDY_DEVICE_ID", option_env!("PILLBUDDY_DEVICE_ID"));
        override_str(
            &mut c.event_topic_base,
            "PILLBUDDY_EVENT_TOPIC_BASE",
            option_env!("PILLBUDDY_EVENT_TOPIC_BASE"),
        );
        override_str(
            &mut c.command_topic_base,
            "PILLBUDDY_COMMAND_TOPIC_BASE",
            option_env!("PILLBUDDY_COMMAND_TOPIC_BASE"),
        );
        override_str(&mut c.client_id, "PILLBUDDY_CLIENT_ID", option_env!("PILLBUDDY_CLIENT_ID"));
        override_str(&mut c.broker_host, "PILLBUDDY_MQTT_HOST", option_env!("PILLBUDDY_MQTT_HOST"));
        override_num(&mut c.broker_port, "PILLBUDDY_MQTT_PORT", option_env!("PILLBUDDY_MQTT_PORT"));
        override_num(&mut c.debounce_ms, "PILLBUDDY_DEBOUNCE_MS", option_env!("PILLBUDDY_DEBOUNCE_MS"));
        override_str(&mut c.wifi_ssid, "WIFI_SSID", option_env!("WIFI_SSID"));
        override_str(&mut c.wifi_password, "WIFI_PASSWORD", option_env!("WIFI_PASSWORD"));
        c
    }

    /// Reject values the tasks cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::ZeroDebounceWindow);
        }
        if self.device_id.is_empty() {
            return Err(ConfigError::EmptyDeviceId);
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::EmptyClientId);
        }
        if self.broker_host.is_empty() {
            return Err(ConfigError::EmptyBrokerHost);
        }
        if self.session.mutex_timeout_ms == 0 {
            return Err(ConfigError::ZeroMutexTimeout);
        }
        // The hint wait bounds detection latency when hints are dropped.
        if self.sensing.hint_wait_ms > self.debounce_ms {
            warn!(
                "CONFIG: hint wait {} ms exceeds debounce window {} ms",
                self.sensing.hint_wait_ms, self.debounce_ms
            );
        }
        Ok(())
    }
}

/// Event and command topics for this device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub event: Topic,
    pub command: Topic,
}

impl Topics {
    /// `<event base>/<device id>` and `<command base>/<device id>`.
    pub fn derive(config: &NodeConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            event: join(&config.event_topic_base, &config.device_id)?,
            command: join(&config.command_topic_base, &config.device_id)?,
        })
    }
}

// ── Internal ──────────────────────────────────────────────────

fn join(base: &str, device_id: &str) -> Result<Topic, ConfigError> {
    let mut topic = Topic::new();
    write!(topic, "{base}/{device_id}").map_err(|_| ConfigError::TopicTooLong)?;
    Ok(topic)
}

fn fixed<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    let _ = out.push_str(s);
    out
}

fn override_str<const N: usize>(field: &mut String<N>, key: &str, value: Option<&str>) {
    let Some(value) = value else { return };
    let mut next = String::new();
    if next.push_str(value).is_ok() {
        *field = next;
    } else {
        warn!("CONFIG: {} longer than {} bytes, keeping default", key, N);
    }
}

fn override_num<T: core::str::FromStr>(field: &mut T, key: &str, value: Option<&str>) {
    let Some(value) = value else { return };
    match value.trim().parse() {
        Ok(v) => *field = v,
        Err(_) => warn!("CONFIG: {}={:?} is not a number, keeping default", key, value),
    }
}
