//! Sensing task: hint wait, slot sampling, debounce, LED override, hand-off.
//!
//! Every pass samples all slots whether or not a hint arrived, so a hint
//! dropped by a full ring delays detection by at most one hint wait.

use std::sync::Arc;

use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;
use log::{info, warn};

use super::millis;
use crate::app::debounce::DebounceEngine;
use crate::app::events::OccupancyEvent;
use crate::app::slots::{Level, SLOT_COUNT, SlotIndex};
use crate::context::NodeContext;

/// How often the hint ring is checked while waiting.
pub const HINT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// What one pass of the sensing loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensePass {
    /// A hint was pending or arrived during the wait.
    pub hinted: bool,
    /// Transitions committed by the debounce engine.
    pub committed: usize,
    /// Committed transitions the delivery queue had no room for.
    pub dropped: usize,
}

pub struct SensingTask<C, L, S> {
    ctx: Arc<NodeContext<C, L>>,
    switches: [S; SLOT_COUNT],
    engine: DebounceEngine,
}

impl<C, L, S> SensingTask<C, L, S>
where
    L: OutputPin,
    S: InputPin,
{
    /// Slots start as "not in holder" until [`seed`](Self::seed) reads them.
    pub fn new(ctx: Arc<NodeContext<C, L>>, switches: [S; SLOT_COUNT]) -> Self {
        let holder = ctx.config.holder_level;
        let engine = DebounceEngine::new(ctx.config.debounce_ms, holder, [holder.inverted(); SLOT_COUNT]);
        Self { ctx, switches, engine }
    }

    pub fn engine(&self) -> &DebounceEngine {
        &self.engine
    }

    /// Seed every slot's stable level and the occupancy mirror from a live
    /// read. Call once at boot before the tasks start.
    pub fn seed(&mut self) {
        let holder = self.engine.holder_level();
        for slot in SlotIndex::all() {
            let level = self.read(slot).unwrap_or(holder.inverted());
            let in_holder = level == holder;
            self.engine.seed(slot, level);
            self.ctx.occupancy.set(slot, in_holder);
            info!("SENSE: slot {} initial level={} in_holder={}", slot, level.as_u8(), in_holder);
        }
    }

    /// Feed one live reading of every slot into the debounce engine.
    ///
    /// Committed transitions update the occupancy mirror, and a removal
    /// forces the slot's LED off, before the events are returned.
    pub fn sample_all(&mut self, now_ms: u64) -> Vec<OccupancyEvent, SLOT_COUNT> {
        let mut committed = Vec::new();
        for slot in SlotIndex::all() {
            let Some(raw) = self.read(slot) else { continue };
            let Some(event) = self.engine.sample(slot, raw, now_ms) else { continue };

            self.ctx.occupancy.set(slot, event.in_holder);
            if !event.in_holder {
                self.ctx.leds.force_off(slot);
            }
            info!(
                "SENSE: slot {} {}",
                slot,
                if event.in_holder { "bottle placed" } else { "bottle removed" }
            );
            let _ = committed.push(event);
        }
        committed
    }

    /// One pass: wait for a hint, sample, and enqueue what committed.
    pub async fn poll_once(&mut self) -> SensePass {
        let hinted = self.wait_for_hint().await;
        let committed = self.sample_all(Instant::now().as_millis());

        let timeout = millis(self.ctx.config.sensing.enqueue_timeout_ms);
        let mut dropped = 0;
        for event in &committed {
            if self.ctx.delivery.enqueue_timeout(*event, timeout).await.is_err() {
                warn!("SENSE: delivery queue full, dropped slot {} event", event.slot);
                dropped += 1;
            }
        }

        SensePass {
            hinted,
            committed: committed.len(),
            dropped,
        }
    }

    pub async fn run(mut self) {
        info!(
            "SENSE: running (debounce={} ms, hint wait={} ms)",
            self.engine.window_ms(),
            self.ctx.config.sensing.hint_wait_ms
        );
        loop {
            self.poll_once().await;
        }
    }

    // ── Internal ──────────────────────────────────────────────

    /// Wait at most the configured hint wait. Extra hints queued behind the
    /// first are discarded; the pass that follows samples every slot anyway.
    async fn wait_for_hint(&self) -> bool {
        let hints = &self.ctx.hints;
        let deadline = Instant::now() + millis(self.ctx.config.sensing.hint_wait_ms);
        loop {
            if hints.pop().is_some() {
                hints.clear();
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            Timer::after(HINT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    fn read(&mut self, slot: SlotIndex) -> Option<Level> {
        match self.switches[slot.index()].is_high() {
            Ok(high) => Some(Level::from(high)),
            Err(e) => {
                warn!("SENSE: slot {} read failed: {:?}", slot, e);
                None
            }
        }
    }
}
