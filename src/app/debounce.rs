//! Per-slot switch debouncing.
//!
//! A raw level that differs from the committed level starts a candidate. The
//! candidate commits only after the raw level has held for the whole
//! debounce window; any sample back at the committed level cancels it.
//! Timestamps are milliseconds from a monotonic clock.

use super::events::OccupancyEvent;
use super::slots::{Level, SLOT_COUNT, SlotIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Pending {
    level: Level,
    since_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SlotState {
    stable: Level,
    /// Only ever holds a level different from `stable`.
    pending: Option<Pending>,
}

/// Debounce state for every slot.
#[derive(Debug, Clone)]
pub struct DebounceEngine {
    window_ms: u64,
    holder_level: Level,
    slots: [SlotState; SLOT_COUNT],
}

impl DebounceEngine {
    /// `holder_level` is the switch level that means "bottle present".
    pub fn new(window_ms: u32, holder_level: Level, initial: [Level; SLOT_COUNT]) -> Self {
        Self {
            window_ms: u64::from(window_ms),
            holder_level,
            slots: initial.map(|stable| SlotState {
                stable,
                pending: None,
            }),
        }
    }

    /// Reset a slot to a known committed level, dropping any candidate.
    pub fn seed(&mut self, slot: SlotIndex, level: Level) {
        self.slots[slot.index()] = SlotState {
            stable: level,
            pending: None,
        };
    }

    /// Feed one raw sample. Returns the committed transition, if any.
    pub fn sample(&mut self, slot: SlotIndex, raw: Level, now_ms: u64) -> Option<OccupancyEvent> {
        let state = &mut self.slots[slot.index()];

        if raw == state.stable {
            state.pending = None;
            return None;
        }

        match state.pending {
            Some(p) if p.level == raw => {
                if now_ms.saturating_sub(p.since_ms) >= self.window_ms {
                    state.stable = raw;
                    state.pending = None;
                    Some(OccupancyEvent::new(slot, raw == self.holder_level))
                } else {
                    None
                }
            }
            _ => {
                state.pending = Some(Pending {
                    level: raw,
                    since_ms: now_ms,
                });
                None
            }
        }
    }

    pub fn stable_level(&self, slot: SlotIndex) -> Level {
        self.slots[slot.index()].stable
    }

    pub fn is_pending(&self, slot: SlotIndex) -> bool {
        self.slots[slot.index()].pending.is_some()
    }

    /// Committed occupancy derived from the stable level.
    pub fn in_holder(&self, slot: SlotIndex) -> bool {
        self.stable_level(slot) == self.holder_level
    }

    pub fn holder_level(&self) -> Level {
        self.holder_level
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}
