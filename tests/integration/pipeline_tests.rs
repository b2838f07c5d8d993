//! End-to-end: switch flip to broker publish, commands racing removals, and
//! session mutex exclusion with all three tasks running on threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use embassy_time::Timer;
use futures_lite::future::block_on;
use pillbuddy::app::slots::SlotIndex;
use pillbuddy::tasks::publisher::{PublishOutcome, PublisherTask};
use pillbuddy::tasks::sensing::SensingTask;
use pillbuddy::tasks::session::SessionManager;

use crate::mock_hw::{empty_switches, fast_config, rig};

const CMD_TOPIC: &str = "pillbuddy/cmd/pillbuddy-001";
const EVENT_TOPIC: &str = "pillbuddy/events/pillbuddy-001";

#[test]
fn seated_bottle_reaches_the_broker() {
    let mut config = fast_config();
    config.startup_snapshot = false;
    let r = rig(config);
    let switches = empty_switches();
    let slot1 = switches[0].clone();

    let mut sensing = SensingTask::new(Arc::clone(&r.ctx), switches);
    sensing.seed();
    let mut manager = SessionManager::new(Arc::clone(&r.ctx));
    let publisher = PublisherTask::new(Arc::clone(&r.ctx));

    r.ctx.readiness.set_link_up();
    block_on(manager.step());

    slot1.set_high(false);
    block_on(sensing.poll_once());
    std::thread::sleep(Duration::from_millis(10));
    assert_eq!(block_on(sensing.poll_once()).committed, 1);

    let event = r.ctx.delivery.try_dequeue().unwrap();
    assert_eq!(block_on(publisher.publish_one(event)), PublishOutcome::Sent);
    assert_eq!(
        r.session.publishes(),
        vec![(
            EVENT_TOPIC.to_owned(),
            r#"{"event_type":"slot_state_changed","slot":1,"in_holder":true}"#.to_owned()
        )]
    );
}

#[test]
fn removal_overrides_earlier_led_command() {
    let r = rig(fast_config());
    let switches = empty_switches();
    switches[1].set_high(false);
    let slot2 = switches[1].clone();

    let mut sensing = SensingTask::new(Arc::clone(&r.ctx), switches);
    sensing.seed();
    let mut manager = SessionManager::new(Arc::clone(&r.ctx));
    r.ctx.readiness.set_link_up();
    block_on(manager.step());

    r.session
        .script()
        .inbound
        .push_back((CMD_TOPIC.into(), br#"{"action":"turn_on","slot":2}"#.to_vec()));
    block_on(manager.step());
    assert!(r.leds[1].is_on());

    slot2.set_high(true);
    sensing.sample_all(0);
    let events = sensing.sample_all(10);
    assert_eq!(events.len(), 1);
    assert!(!events[0].in_holder);
    assert!(!r.leds[1].is_on());
    assert!(!r.ctx.leds.get(SlotIndex::from_number(2).unwrap()));
}

#[test]
fn publish_and_service_never_overlap() {
    let mut config = fast_config();
    config.session.loop_backoff_ms = 1;
    config.session.mutex_timeout_ms = 2_000;
    let r = rig(config);
    r.session.script().call_time = Duration::from_millis(1);
    r.ctx.readiness.set_link_up();

    let done = Arc::new(AtomicBool::new(false));

    let manager_thread = {
        let ctx = Arc::clone(&r.ctx);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            let mut manager = SessionManager::new(ctx);
            block_on(async {
                while !done.load(Ordering::SeqCst) {
                    if let Some(backoff) = manager.step().await {
                        Timer::after(backoff).await;
                    }
                }
            });
        })
    };

    let publisher = PublisherTask::new(Arc::clone(&r.ctx));
    let mut outcomes = Vec::new();
    for i in 0..30 {
        let slot = SlotIndex::new(i % 3).unwrap();
        let event = pillbuddy::app::events::OccupancyEvent::new(slot, i % 2 == 0);
        outcomes.push(block_on(publisher.publish_one(event)));
    }
    done.store(true, Ordering::SeqCst);
    manager_thread.join().unwrap();

    assert!(!r.session.script().overlapped);
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, PublishOutcome::Sent | PublishOutcome::SessionBusy))
    );
    let services = r
        .session
        .script()
        .count(|c| matches!(c, crate::mock_hw::SessionCall::Service));
    assert!(services > 0);
}
