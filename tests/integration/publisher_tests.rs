//! Publisher task: readiness gating, mutex timeout and failure handling.

use std::sync::Arc;
use std::time::Duration;

use futures_lite::future::block_on;
use pillbuddy::app::events::OccupancyEvent;
use pillbuddy::app::ports::Qos;
use pillbuddy::error::SessionError;
use pillbuddy::app::slots::SlotIndex;
use pillbuddy::tasks::publisher::{PublishOutcome, PublisherTask};

use crate::mock_hw::{SessionCall, fast_config, rig};

fn event(n: i64, in_holder: bool) -> OccupancyEvent {
    OccupancyEvent::new(SlotIndex::from_number(n).unwrap(), in_holder)
}

#[test]
fn sends_wire_payload_on_event_topic_at_qos1() {
    let r = rig(fast_config());
    r.ctx.readiness.set_link_up();
    r.ctx.readiness.set_session_ready();
    let publisher = PublisherTask::new(Arc::clone(&r.ctx));

    assert_eq!(block_on(publisher.publish_one(event(2, false))), PublishOutcome::Sent);

    assert_eq!(
        r.session.calls(),
        vec![SessionCall::Publish {
            topic: "pillbuddy/events/pillbuddy-001".into(),
            payload: r#"{"event_type":"slot_state_changed","slot":2,"in_holder":false}"#.into(),
            qos: Qos::AtLeastOnce,
        }]
    );
}

#[test]
fn ack_timeout_is_not_retried_and_keeps_readiness() {
    let r = rig(fast_config());
    r.ctx.readiness.set_link_up();
    r.ctx.readiness.set_session_ready();
    r.session.script().publish.push_back(Err(SessionError::AckTimeout));
    let publisher = PublisherTask::new(Arc::clone(&r.ctx));

    assert_eq!(block_on(publisher.publish_one(event(1, true))), PublishOutcome::AckTimeout);
    assert!(r.ctx.readiness.is_session_ready());
    assert_eq!(r.session.publishes().len(), 1);
}

#[test]
fn other_failures_clear_session_readiness() {
    let r = rig(fast_config());
    r.ctx.readiness.set_link_up();
    r.ctx.readiness.set_session_ready();
    r.session.script().publish.push_back(Err(SessionError::TlsRead));
    let publisher = PublisherTask::new(Arc::clone(&r.ctx));

    assert_eq!(
        block_on(publisher.publish_one(event(3, true))),
        PublishOutcome::Failed(SessionError::TlsRead)
    );
    assert!(!r.ctx.readiness.is_session_ready());
    assert!(r.ctx.readiness.is_link_up());
}

#[test]
fn held_session_mutex_times_out_and_drops_event() {
    let r = rig(fast_config()); // mutex timeout 30 ms
    r.ctx.readiness.set_link_up();
    r.ctx.readiness.set_session_ready();
    let publisher = PublisherTask::new(Arc::clone(&r.ctx));

    let guard = block_on(r.ctx.session.lock());
    let outcome = block_on(publisher.publish_one(event(1, true)));
    drop(guard);

    assert_eq!(outcome, PublishOutcome::SessionBusy);
    assert!(r.session.publishes().is_empty());
    assert!(r.ctx.readiness.is_session_ready());
}

#[test]
fn waits_for_session_readiness_before_publishing() {
    let r = rig(fast_config());
    r.ctx.readiness.set_link_up();
    let publisher = PublisherTask::new(Arc::clone(&r.ctx));

    let ctx = Arc::clone(&r.ctx);
    let session = r.session.clone();
    let setter = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        assert!(session.publishes().is_empty(), "published before readiness");
        ctx.readiness.set_session_ready();
    });

    assert_eq!(block_on(publisher.publish_one(event(1, true))), PublishOutcome::Sent);
    setter.join().unwrap();
    assert_eq!(r.session.publishes().len(), 1);
}
