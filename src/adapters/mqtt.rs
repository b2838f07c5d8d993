//! MQTT-over-TLS session adapter (ESP-IDF only).
//!
//! Implements [`SessionClient`] on top of `esp_idf_svc::mqtt::client`. The
//! ESP-IDF client is event driven; a small pump thread forwards its events
//! into a channel, and the blocking port calls below drain that channel
//! with deadlines.
//!
//! Connection parameters: `mqtts://host:port`, MQTT 3.1.1, clean session,
//! no will message, hostname verification on.

use core::time::Duration;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Instant;

use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, MqttClientConfiguration, MqttProtocolVersion, QoS,
};
use esp_idf_svc::tls::X509;
use log::{debug, info, warn};

use super::broker::{PemStore, TlsCredentials, classify_connect_failure};
use crate::app::ports::{ConnectParams, Qos, ServiceStatus, SessionClient, SessionParams};
use crate::error::SessionError;

/// Stack for the event pump thread.
const PUMP_STACK_BYTES: usize = 4 * 1024;

/// The ESP-IDF loader wants NUL-terminated PEM with a 'static lifetime.
fn x509(pem: Option<&'static [u8]>) -> Option<X509<'static>> {
    pem.map(X509::pem_until_nul)
}

// ── Event pump ────────────────────────────────────────────────

#[derive(Debug)]
enum MqttEvent {
    Connected,
    Disconnected,
    Subscribed(u32),
    Published(u32),
    Received { topic: String, data: Vec<u8> },
    Error(i32),
}

struct Link {
    client: EspMqttClient<'static>,
    events: Receiver<MqttEvent>,
}

// ── Session adapter ───────────────────────────────────────────

pub struct EspSession {
    pem: PemStore,
    url: String,
    command_timeout: Duration,
    network_timeout: Duration,
    verify_hostname: bool,
    auto_reconnect: bool,
    /// The client lost the broker and is reconnecting by itself.
    reconnecting: bool,
    link: Option<Link>,
    /// Messages that arrived while a publish or subscribe waited for its ack.
    inbox: Vec<(String, Vec<u8>)>,
    initialized: bool,
}

impl EspSession {
    pub fn new(credentials: TlsCredentials) -> Self {
        Self {
            pem: PemStore::new(credentials),
            url: String::new(),
            command_timeout: Duration::from_secs(20),
            network_timeout: Duration::from_secs(5),
            verify_hostname: true,
            auto_reconnect: false,
            reconnecting: false,
            link: None,
            inbox: Vec::new(),
            initialized: false,
        }
    }

    fn link(&mut self) -> Result<&mut Link, SessionError> {
        self.link.as_mut().ok_or(SessionError::Disconnected)
    }

    /// Wait until `done` matches an event, buffering inbound messages.
    fn wait_for(&mut self, mut done: impl FnMut(&MqttEvent) -> bool) -> Result<(), SessionError> {
        let deadline = Instant::now() + self.command_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match self.link()?.events.recv_timeout(remaining) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => return Err(SessionError::AckTimeout),
                Err(RecvTimeoutError::Disconnected) => return Err(SessionError::Disconnected),
            };
            if done(&event) {
                return Ok(());
            }
            match event {
                MqttEvent::Received { topic, data } => self.inbox.push((topic, data)),
                MqttEvent::Disconnected => {
                    self.reconnecting = self.auto_reconnect;
                    return Err(SessionError::Disconnected);
                }
                MqttEvent::Error(code) => warn!("MQTT: client error {}", code),
                _ => {}
            }
        }
    }
}

fn qos(q: Qos) -> QoS {
    match q {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
    }
}

impl SessionClient for EspSession {
    fn init(&mut self, params: &SessionParams<'_>) -> Result<(), SessionError> {
        if params.host.is_empty() {
            return Err(SessionError::UnknownHost);
        }
        self.url = format!("mqtts://{}:{}", params.host, params.port);
        self.command_timeout = params.command_timeout;
        self.network_timeout = params.tls_handshake_timeout;
        self.verify_hostname = params.verify_hostname;
        self.auto_reconnect = params.auto_reconnect;
        self.pem.get();
        self.initialized = true;
        info!("MQTT: session object ready for {}", self.url);
        Ok(())
    }

    fn connect(&mut self, params: &ConnectParams<'_>) -> Result<(), SessionError> {
        if !self.initialized {
            return Err(SessionError::NotInitialized);
        }
        // Dropping the old client ends its pump thread.
        self.link = None;
        self.reconnecting = false;
        self.inbox.clear();

        let pem = self.pem.get();
        let conf = MqttClientConfiguration {
            client_id: Some(params.client_id),
            keep_alive_interval: Some(params.keep_alive),
            disable_clean_session: !params.clean_session,
            protocol_version: Some(MqttProtocolVersion::V3_1_1),
            network_timeout: self.network_timeout,
            skip_cert_common_name_check: !self.verify_hostname,
            server_certificate: x509(pem.root_ca),
            client_certificate: x509(pem.client_cert),
            private_key: x509(pem.private_key),
            ..Default::default()
        };

        let (client, mut connection) = EspMqttClient::new(&self.url, &conf).map_err(|e| {
            warn!("MQTT: client create failed: {}", e);
            SessionError::Transport(e.code())
        })?;

        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("mqtt-pump".into())
            .stack_size(PUMP_STACK_BYTES)
            .spawn(move || {
                while let Ok(event) = connection.next() {
                    let forwarded = match event.payload() {
                        EventPayload::Connected(_) => MqttEvent::Connected,
                        EventPayload::Disconnected => MqttEvent::Disconnected,
                        EventPayload::Subscribed(id) => MqttEvent::Subscribed(id),
                        EventPayload::Published(id) => MqttEvent::Published(id),
                        EventPayload::Received { topic, data, .. } => MqttEvent::Received {
                            topic: topic.unwrap_or_default().to_owned(),
                            data: data.to_vec(),
                        },
                        EventPayload::Error(e) => MqttEvent::Error(e.code()),
                        _ => continue,
                    };
                    if tx.send(forwarded).is_err() {
                        break;
                    }
                }
                debug!("MQTT: event pump stopped");
            })
            .map_err(|_| SessionError::Transport(-1))?;

        self.link = Some(Link { client, events: rx });

        let mut closed_early = false;
        let mut last_error = None;
        let outcome = self.wait_for(|e| {
            match e {
                MqttEvent::Disconnected => closed_early = true,
                MqttEvent::Error(code) => last_error = Some(*code),
                _ => {}
            }
            matches!(e, MqttEvent::Connected)
        });
        match outcome {
            Ok(()) => Ok(()),
            Err(e) => {
                self.link = None;
                if closed_early || last_error.is_some() {
                    debug!("MQTT: connect closed, last client error {:?}", last_error);
                    Err(classify_connect_failure(last_error))
                } else {
                    Err(e)
                }
            }
        }
    }

    fn set_auto_reconnect(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.auto_reconnect = enabled;
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, q: Qos) -> Result<(), SessionError> {
        let id = self
            .link()?
            .client
            .subscribe(topic, qos(q))
            .map_err(|e| SessionError::Transport(e.code()))?;
        self.wait_for(|e| matches!(e, MqttEvent::Subscribed(got) if *got == id))
    }

    fn publish(&mut self, topic: &str, payload: &[u8], q: Qos) -> Result<(), SessionError> {
        let id = self
            .link()?
            .client
            .publish(topic, qos(q), false, payload)
            .map_err(|e| SessionError::Transport(e.code()))?;
        if q == Qos::AtMostOnce {
            return Ok(());
        }
        self.wait_for(|e| matches!(e, MqttEvent::Published(got) if *got == id))
    }

    fn service(
        &mut self,
        slice: Duration,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<ServiceStatus, SessionError> {
        for (topic, data) in self.inbox.drain(..) {
            on_message(&topic, &data);
        }

        let mut status = if self.reconnecting {
            ServiceStatus::ReconnectInProgress
        } else {
            ServiceStatus::Idle
        };
        let deadline = Instant::now() + slice;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.link()?.events.recv_timeout(remaining) {
                Ok(MqttEvent::Received { topic, data }) => on_message(&topic, &data),
                Ok(MqttEvent::Connected) if self.reconnecting => {
                    self.reconnecting = false;
                    status = ServiceStatus::Reconnected;
                }
                Ok(MqttEvent::Disconnected) => {
                    if !self.auto_reconnect {
                        self.link = None;
                        return Err(SessionError::Disconnected);
                    }
                    self.reconnecting = true;
                    status = ServiceStatus::ReconnectInProgress;
                }
                Ok(MqttEvent::Error(code)) => warn!("MQTT: client error {}", code),
                Ok(_) => {}
                Err(RecvTimeoutError::Timeout) => return Ok(status),
                Err(RecvTimeoutError::Disconnected) => {
                    self.link = None;
                    return Err(SessionError::Disconnected);
                }
            }
        }
    }
}
