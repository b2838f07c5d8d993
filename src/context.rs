//! Shared context threaded through the three node tasks.
//!
//! `NodeContext` owns every piece of cross-task state: readiness, the hint
//! ring, the delivery queue, the guarded session, the LED bank and the
//! occupancy mirror. It is built once at boot, wrapped in an `Arc`, and
//! handed to each task; nothing lives in free-floating globals.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embedded_hal::digital::OutputPin;

use crate::app::delivery::DeliveryQueue;
use crate::app::ports::SessionClient;
use crate::app::readiness::ReadinessSignal;
use crate::app::session::Session;
use crate::app::slots::{LedBank, OccupancyMirror, SLOT_COUNT};
use crate::config::{NodeConfig, Topics};
use crate::error::Result;
use crate::events::InterruptBridge;

/// The session behind its mutex; every client call happens with it held.
pub type SessionGate<C> = Mutex<CriticalSectionRawMutex, Session<C>>;

pub struct NodeContext<C, L> {
    pub config: NodeConfig,
    pub readiness: ReadinessSignal,
    pub hints: InterruptBridge,
    pub delivery: DeliveryQueue,
    pub session: SessionGate<C>,
    pub leds: LedBank<L>,
    pub occupancy: OccupancyMirror,
}

impl<C: SessionClient, L: OutputPin> NodeContext<C, L> {
    /// Validate the configuration, derive topics and assemble the context.
    pub fn new(config: NodeConfig, client: C, leds: [L; SLOT_COUNT]) -> Result<Self> {
        config.validate()?;
        let topics = Topics::derive(&config)?;
        Ok(Self {
            readiness: ReadinessSignal::new(),
            hints: InterruptBridge::new(),
            delivery: DeliveryQueue::new(),
            session: Mutex::new(Session::new(client, topics)),
            leds: LedBank::new(leds),
            occupancy: OccupancyMirror::new(),
            config,
        })
    }
}
