//! Mock hardware and broker session for integration tests.
//!
//! Switches and LEDs share their state with probes the test keeps, so a
//! test can flip a switch or check an LED after the pins have moved into the
//! node context. The session client replays scripted results and records
//! every call.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use pillbuddy::app::ports::{ConnectParams, Qos, ServiceStatus, SessionClient, SessionParams};
use pillbuddy::error::SessionError;
use pillbuddy::app::slots::SLOT_COUNT;
use pillbuddy::config::NodeConfig;
use pillbuddy::context::NodeContext;

// ── Switches ──────────────────────────────────────────────────

/// A slot switch whose level is set through a cloned handle.
#[derive(Clone, Default)]
pub struct MockSwitch {
    high: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockSwitch {
    pub fn new(high: bool) -> Self {
        Self {
            high: Arc::new(AtomicBool::new(high)),
        }
    }

    pub fn set_high(&self, high: bool) {
        self.high.store(high, Ordering::SeqCst);
    }
}

impl ErrorType for MockSwitch {
    type Error = Infallible;
}

impl InputPin for MockSwitch {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.high.load(Ordering::SeqCst))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.high.load(Ordering::SeqCst))
    }
}

// ── LEDs ──────────────────────────────────────────────────────

/// An LED output that mirrors its level into a probe.
#[derive(Clone, Default)]
pub struct MockLed {
    on: Arc<AtomicBool>,
    writes: Arc<AtomicU32>,
}

#[allow(dead_code)]
impl MockLed {
    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ErrorType for MockLed {
    type Error = Infallible;
}

impl OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.on.store(false, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.on.store(true, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Session client ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Init { host: String, port: u16, auto_reconnect: bool },
    Connect { client_id: String, clean_session: bool },
    AutoReconnect(bool),
    Subscribe { topic: String, qos: Qos },
    Publish { topic: String, payload: String, qos: Qos },
    Service,
}

/// Scripted results, consumed front to back. An empty queue means success.
#[derive(Default)]
pub struct Script {
    pub calls: Vec<SessionCall>,
    pub init: VecDeque<Result<(), SessionError>>,
    pub connect: VecDeque<Result<(), SessionError>>,
    pub subscribe: VecDeque<Result<(), SessionError>>,
    pub publish: VecDeque<Result<(), SessionError>>,
    pub service: VecDeque<Result<ServiceStatus, SessionError>>,
    /// Messages delivered on the next service call.
    pub inbound: VecDeque<(String, Vec<u8>)>,
    /// How long publish and service pretend to take.
    pub call_time: Duration,
    /// Set if a publish or service started while another was running.
    pub overlapped: bool,
}

#[allow(dead_code)]
impl Script {
    pub fn publishes(&self) -> Vec<(String, String)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SessionCall::Publish { topic, payload, .. } => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&SessionCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

pub struct MockSession {
    script: Arc<Mutex<Script>>,
    busy: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl MockSession {
    pub fn new() -> (Self, SessionProbe) {
        let script = Arc::new(Mutex::new(Script::default()));
        let probe = SessionProbe {
            script: Arc::clone(&script),
        };
        (
            Self {
                script,
                busy: Arc::new(AtomicBool::new(false)),
            },
            probe,
        )
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Mark the client busy for the length of one simulated call.
    fn occupy(&self) {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.script().overlapped = true;
        }
        let call_time = self.script().call_time;
        if !call_time.is_zero() {
            std::thread::sleep(call_time);
        }
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Test-side handle onto a [`MockSession`] already moved into the context.
#[derive(Clone)]
pub struct SessionProbe {
    script: Arc<Mutex<Script>>,
}

#[allow(dead_code)]
impl SessionProbe {
    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.script().calls.clone()
    }

    pub fn publishes(&self) -> Vec<(String, String)> {
        self.script().publishes()
    }

    pub fn connects(&self) -> usize {
        self.script().count(|c| matches!(c, SessionCall::Connect { .. }))
    }
}

impl SessionClient for MockSession {
    fn init(&mut self, params: &SessionParams<'_>) -> Result<(), SessionError> {
        let mut s = self.script();
        s.calls.push(SessionCall::Init {
            host: params.host.to_owned(),
            port: params.port,
            auto_reconnect: params.auto_reconnect,
        });
        s.init.pop_front().unwrap_or(Ok(()))
    }

    fn connect(&mut self, params: &ConnectParams<'_>) -> Result<(), SessionError> {
        let mut s = self.script();
        s.calls.push(SessionCall::Connect {
            client_id: params.client_id.to_owned(),
            clean_session: params.clean_session,
        });
        s.connect.pop_front().unwrap_or(Ok(()))
    }

    fn set_auto_reconnect(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.script().calls.push(SessionCall::AutoReconnect(enabled));
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), SessionError> {
        let mut s = self.script();
        s.calls.push(SessionCall::Subscribe {
            topic: topic.to_owned(),
            qos,
        });
        s.subscribe.pop_front().unwrap_or(Ok(()))
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), SessionError> {
        self.occupy();
        let mut s = self.script();
        s.calls.push(SessionCall::Publish {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            qos,
        });
        s.publish.pop_front().unwrap_or(Ok(()))
    }

    fn service(
        &mut self,
        _slice: Duration,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) -> Result<ServiceStatus, SessionError> {
        self.occupy();
        let (inbound, result) = {
            let mut s = self.script();
            s.calls.push(SessionCall::Service);
            let inbound: Vec<_> = s.inbound.drain(..).collect();
            (inbound, s.service.pop_front().unwrap_or(Ok(ServiceStatus::Idle)))
        };
        for (topic, payload) in inbound {
            on_message(&topic, &payload);
        }
        result
    }
}

// ── Context builder ───────────────────────────────────────────

pub type TestContext = NodeContext<MockSession, MockLed>;

/// Everything a test needs: the shared context plus the probes.
pub struct Rig {
    pub ctx: Arc<TestContext>,
    pub session: SessionProbe,
    pub leds: [MockLed; SLOT_COUNT],
}

/// Default config with short delays so failure paths stay fast.
#[allow(dead_code)]
pub fn fast_config() -> NodeConfig {
    let mut c = NodeConfig::default();
    c.debounce_ms = 5;
    c.sensing.hint_wait_ms = 2;
    c.sensing.enqueue_timeout_ms = 5;
    c.session.mutex_timeout_ms = 30;
    c
}

#[allow(dead_code)]
pub fn rig(config: NodeConfig) -> Rig {
    let (client, session) = MockSession::new();
    let leds: [MockLed; SLOT_COUNT] = Default::default();
    let ctx = NodeContext::new(config, client, leds.clone()).unwrap();
    Rig {
        ctx: Arc::new(ctx),
        session,
        leds,
    }
}

/// Switches with no bottle seated (pull-up reads high).
#[allow(dead_code)]
pub fn empty_switches() -> [MockSwitch; SLOT_COUNT] {
    [MockSwitch::new(true), MockSwitch::new(true), MockSwitch::new(true)]
}
