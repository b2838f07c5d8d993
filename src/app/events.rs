//! Outbound occupancy events.
//!
//! The sensing task emits an [`OccupancyEvent`] for every committed
//! transition. The publisher task serialises it with
//! [`to_payload`](OccupancyEvent::to_payload) and sends it on the event
//! topic.

use serde::Serialize;

use super::slots::SlotIndex;

/// Value of the `event_type` field of every occupancy message.
pub const SLOT_STATE_CHANGED: &str = "slot_state_changed";

/// A committed occupancy change (or a snapshot of the current state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyEvent {
    pub slot: SlotIndex,
    pub in_holder: bool,
}

#[derive(Serialize)]
struct WireEvent {
    event_type: &'static str,
    slot: u8,
    in_holder: bool,
}

impl OccupancyEvent {
    pub const fn new(slot: SlotIndex, in_holder: bool) -> Self {
        Self { slot, in_holder }
    }

    /// JSON body: `{"event_type":"slot_state_changed","slot":N,"in_holder":B}`
    /// with `N` the one-based slot number.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&WireEvent {
            event_type: SLOT_STATE_CHANGED,
            slot: self.slot.number(),
            in_holder: self.in_holder,
        })
    }
}
