//! Session manager state machine against a scripted broker session.

use std::sync::Arc;
use std::time::Duration;

use embassy_time::Duration as Backoff;
use futures_lite::future::block_on;
use pillbuddy::app::ports::{Qos, ServiceStatus};
use pillbuddy::error::SessionError;
use pillbuddy::app::slots::SlotIndex;
use pillbuddy::config::NodeConfig;
use pillbuddy::tasks::session::{SessionManager, SessionState};

use crate::mock_hw::{MockLed, MockSession, Rig, SessionCall, fast_config, rig};

type Manager = SessionManager<MockSession, MockLed>;

const CMD_TOPIC: &str = "pillbuddy/cmd/pillbuddy-001";

fn ms(v: u32) -> Option<Backoff> {
    Some(Backoff::from_millis(u64::from(v)))
}

fn linked(config: NodeConfig) -> (Rig, Manager) {
    let r = rig(config);
    r.ctx.readiness.set_link_up();
    let manager = SessionManager::new(Arc::clone(&r.ctx));
    (r, manager)
}

#[test]
fn first_step_connects_subscribes_and_snapshots() {
    let (r, mut m) = linked(fast_config());
    r.ctx.occupancy.set(SlotIndex::from_number(2).unwrap(), true);
    assert!(!r.ctx.readiness.is_session_ready());
    assert_eq!(m.state(), SessionState::Disconnected);

    let backoff = block_on(m.step());

    assert_eq!(backoff, ms(r.ctx.config.session.loop_backoff_ms));
    assert_eq!(m.state(), SessionState::Ready);
    assert!(r.ctx.readiness.is_session_ready());
    assert!(m.snapshot_published());

    let calls = r.session.calls();
    assert_eq!(
        calls[..4],
        [
            SessionCall::Init {
                host: "mqtt.local".into(),
                port: 8883,
                auto_reconnect: false,
            },
            SessionCall::Connect {
                client_id: "pillbuddy-001".into(),
                clean_session: true,
            },
            SessionCall::AutoReconnect(true),
            SessionCall::Subscribe {
                topic: CMD_TOPIC.into(),
                qos: Qos::AtMostOnce,
            },
        ]
    );
    let payloads: Vec<String> = r.session.publishes().into_iter().map(|(_, p)| p).collect();
    assert_eq!(
        payloads,
        vec![
            r#"{"event_type":"slot_state_changed","slot":1,"in_holder":false}"#.to_owned(),
            r#"{"event_type":"slot_state_changed","slot":2,"in_holder":true}"#.to_owned(),
            r#"{"event_type":"slot_state_changed","slot":3,"in_holder":false}"#.to_owned(),
        ]
    );
    assert_eq!(calls.last(), Some(&SessionCall::Service));
}

#[test]
fn init_failure_retries_init() {
    let (r, mut m) = linked(fast_config());
    r.session.script().init.push_back(Err(SessionError::Transport(-1)));

    assert_eq!(block_on(m.step()), ms(r.ctx.config.session.init_retry_ms));
    assert_eq!(m.state(), SessionState::Initializing);
    assert_eq!(r.session.connects(), 0);

    block_on(m.step());
    assert_eq!(m.state(), SessionState::Ready);
}

#[test]
fn rejected_connect_backs_off_and_retries_from_connecting() {
    let (r, mut m) = linked(fast_config());
    r.session.script().connect.push_back(Err(SessionError::NotAuthorized));

    assert_eq!(block_on(m.step()), ms(r.ctx.config.session.connect_retry_ms));
    assert_eq!(m.state(), SessionState::Connecting);
    assert!(!r.ctx.readiness.is_session_ready());

    block_on(m.step());
    assert_eq!(m.state(), SessionState::Ready);
    assert_eq!(r.session.connects(), 2);
    let inits = r.session.script().count(|c| matches!(c, SessionCall::Init { .. }));
    assert_eq!(inits, 1);
}

#[test]
fn subscribe_failure_reconnects() {
    let (r, mut m) = linked(fast_config());
    r.session.script().subscribe.push_back(Err(SessionError::AckTimeout));

    assert_eq!(block_on(m.step()), ms(r.ctx.config.session.connect_retry_ms));
    assert_eq!(m.state(), SessionState::Connecting);
    assert!(!r.ctx.readiness.is_session_ready());
    assert!(r.session.publishes().is_empty());

    block_on(m.step());
    assert_eq!(r.session.connects(), 2);
    assert!(r.ctx.readiness.is_session_ready());
}

#[test]
fn service_error_clears_readiness_and_falls_back() {
    let (r, mut m) = linked(fast_config());
    block_on(m.step());
    r.session.script().service.push_back(Err(SessionError::Disconnected));

    assert_eq!(block_on(m.step()), ms(r.ctx.config.session.service_fail_ms));
    assert_eq!(m.state(), SessionState::Disconnected);
    assert!(!r.ctx.readiness.is_session_ready());

    block_on(m.step());
    assert_eq!(m.state(), SessionState::Ready);
    assert_eq!(r.session.connects(), 2);
}

#[test]
fn reconnect_in_progress_stays_ready_and_polls_sooner() {
    let (r, mut m) = linked(fast_config());
    block_on(m.step());
    r.session.script().service.push_back(Ok(ServiceStatus::ReconnectInProgress));

    assert_eq!(block_on(m.step()), ms(r.ctx.config.session.reconnect_poll_ms));
    assert_eq!(m.state(), SessionState::Ready);
    assert!(r.ctx.readiness.is_session_ready());
}

#[test]
fn client_reconnect_renews_subscription_without_connecting() {
    let (r, mut m) = linked(fast_config());
    block_on(m.step());
    r.session.script().service.push_back(Ok(ServiceStatus::Reconnected));

    block_on(m.step());

    let subscribes = r.session.script().count(|c| matches!(c, SessionCall::Subscribe { .. }));
    assert_eq!(subscribes, 2);
    assert_eq!(r.session.connects(), 1);
    assert!(r.ctx.readiness.is_session_ready());
}

#[test]
fn failed_resubscribe_renegotiates_next_step() {
    let (r, mut m) = linked(fast_config());
    block_on(m.step());
    {
        let mut s = r.session.script();
        s.service.push_back(Ok(ServiceStatus::Reconnected));
        s.subscribe.push_back(Err(SessionError::Disconnected));
    }

    assert_eq!(block_on(m.step()), None);
    assert!(!r.ctx.readiness.is_session_ready());

    block_on(m.step());
    assert_eq!(r.session.connects(), 2);
    assert!(r.ctx.readiness.is_session_ready());
}

#[test]
fn readiness_cleared_elsewhere_forces_reconnect() {
    let (r, mut m) = linked(fast_config());
    block_on(m.step());
    r.ctx.readiness.clear_session_ready();

    block_on(m.step());

    assert_eq!(r.session.connects(), 2);
    assert_eq!(m.state(), SessionState::Ready);
    assert!(r.ctx.readiness.is_session_ready());
}

#[test]
fn snapshot_goes_out_once_per_boot() {
    let (r, mut m) = linked(fast_config());
    block_on(m.step());
    r.session.script().service.push_back(Err(SessionError::Disconnected));
    block_on(m.step());
    block_on(m.step());

    assert_eq!(r.session.connects(), 2);
    assert_eq!(r.session.publishes().len(), 3);
}

#[test]
fn failed_snapshot_is_retried_on_next_session() {
    let (r, mut m) = linked(fast_config());
    r.session.script().publish.push_back(Err(SessionError::Transport(-2)));

    block_on(m.step());
    assert!(!m.snapshot_published());
    assert_eq!(r.session.publishes().len(), 1);

    r.session.script().service.push_back(Err(SessionError::Disconnected));
    block_on(m.step());
    block_on(m.step());

    assert!(m.snapshot_published());
    assert_eq!(r.session.publishes().len(), 4);
}

#[test]
fn snapshot_can_be_disabled() {
    let mut config = fast_config();
    config.startup_snapshot = false;
    let (r, mut m) = linked(config);

    block_on(m.step());

    assert!(r.ctx.readiness.is_session_ready());
    assert!(r.session.publishes().is_empty());
}

#[test]
fn inbound_commands_drive_leds() {
    let (r, mut m) = linked(fast_config());
    block_on(m.step());
    {
        let mut s = r.session.script();
        s.inbound.push_back((CMD_TOPIC.into(), br#"{"action":"turn_on","slot":2}"#.to_vec()));
        s.inbound.push_back((CMD_TOPIC.into(), br#"{"action":"turn_on","slot":4}"#.to_vec()));
        s.inbound.push_back((CMD_TOPIC.into(), b"not json".to_vec()));
    }

    block_on(m.step());

    assert!(!r.leds[0].is_on());
    assert!(r.leds[1].is_on());
    assert!(!r.leds[2].is_on());
    assert_eq!(m.state(), SessionState::Ready);
}

#[test]
fn busy_mutex_backs_off_without_advancing() {
    let (r, mut m) = linked(fast_config());
    let guard = block_on(r.ctx.session.lock());

    let backoff = block_on(m.step());
    drop(guard);

    assert_eq!(backoff, ms(r.ctx.config.session.lock_retry_ms));
    assert_eq!(m.state(), SessionState::Initializing);
    assert!(r.session.calls().is_empty());
}

#[test]
fn link_loss_waits_for_link_and_reconnects() {
    let (r, mut m) = linked(fast_config());
    block_on(m.step());
    r.ctx.readiness.clear_link_up();

    let ctx = Arc::clone(&r.ctx);
    let link = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        ctx.readiness.set_link_up();
    });

    block_on(m.step());
    link.join().unwrap();

    assert_eq!(m.state(), SessionState::Ready);
    assert_eq!(r.session.connects(), 2);
    assert!(r.ctx.readiness.is_session_ready());
}
