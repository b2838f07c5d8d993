//! Slot model: indices, switch levels, the per-slot LED bank and the
//! committed occupancy mirror.
//!
//! The LED bank is shared between the sensing task (forced-off on removal)
//! and the command path (set on/off from the broker). Each slot's LED lives
//! in its own lock together with its output pin, so the cached state and the
//! pin are always updated together and slots never contend with each other.

use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embedded_hal::digital::{OutputPin, PinState};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Number of pill-bottle slots on the holder.
pub const SLOT_COUNT: usize = 3;

// ── Slot index ────────────────────────────────────────────────

/// Zero-based slot index, guaranteed `< SLOT_COUNT`.
///
/// Logs and wire payloads use the one-based [`number`](Self::number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub const FIRST: Self = Self(0);
    pub const LAST: Self = Self(SLOT_COUNT as u8 - 1);

    /// Build from a zero-based index.
    pub const fn new(index: usize) -> Option<Self> {
        if index < SLOT_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Build from a one-based slot number as used on the wire.
    pub fn from_number(number: i64) -> Option<Self> {
        if (1..=SLOT_COUNT as i64).contains(&number) {
            Some(Self((number - 1) as u8))
        } else {
            None
        }
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// One-based slot number.
    pub const fn number(self) -> u8 {
        self.0 + 1
    }

    /// Every slot in ascending order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..SLOT_COUNT as u8).map(Self)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// ── Switch level ──────────────────────────────────────────────

/// Electrical level read from a slot switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub const fn inverted(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }

    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::High => 1,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}

impl From<PinState> for Level {
    fn from(state: PinState) -> Self {
        match state {
            PinState::Low => Self::Low,
            PinState::High => Self::High,
        }
    }
}

// ── LED bank ──────────────────────────────────────────────────

struct LedCell<L> {
    pin: L,
    on: bool,
}

/// Per-slot indicator LEDs, each behind its own critical-section lock.
pub struct LedBank<L> {
    cells: [Mutex<CriticalSectionRawMutex, RefCell<LedCell<L>>>; SLOT_COUNT],
}

impl<L: OutputPin> LedBank<L> {
    /// Take ownership of the LED output pins. Cached state starts off; the
    /// boot path drives the real state with [`set_all`](Self::set_all).
    pub fn new(pins: [L; SLOT_COUNT]) -> Self {
        Self {
            cells: pins.map(|pin| Mutex::new(RefCell::new(LedCell { pin, on: false }))),
        }
    }

    /// Drive one slot's LED. The cached state only changes when the pin
    /// write succeeds. Returns `true` on success.
    pub fn set(&self, slot: SlotIndex, on: bool) -> bool {
        let written = self.cells[slot.index()].lock(|cell| {
            let mut cell = cell.borrow_mut();
            let result = cell.pin.set_state(PinState::from(on));
            if result.is_ok() {
                cell.on = on;
            }
            result
        });
        match written {
            Ok(()) => true,
            Err(e) => {
                warn!("LED: slot {} write failed: {:?}", slot, e);
                false
            }
        }
    }

    /// Last state successfully written to this slot's LED.
    pub fn get(&self, slot: SlotIndex) -> bool {
        self.cells[slot.index()].lock(|cell| cell.borrow().on)
    }

    /// Turn the LED off if it is currently on. Returns `true` when the LED
    /// was switched off by this call.
    pub fn force_off(&self, slot: SlotIndex) -> bool {
        let switched = self.cells[slot.index()].lock(|cell| {
            let mut cell = cell.borrow_mut();
            if !cell.on {
                return false;
            }
            if cell.pin.set_low().is_ok() {
                cell.on = false;
                true
            } else {
                false
            }
        });
        if switched {
            info!("LED: slot {} forced off (bottle removed)", slot);
        }
        switched
    }

    /// Drive every LED to the same state.
    pub fn set_all(&self, on: bool) {
        for slot in SlotIndex::all() {
            self.set(slot, on);
        }
    }
}

// ── Occupancy mirror ──────────────────────────────────────────

/// Committed (debounced) occupancy per slot.
///
/// Written only by the sensing task when it commits a transition; read by
/// the session manager to build the startup snapshot.
#[derive(Debug)]
pub struct OccupancyMirror {
    in_holder: [AtomicBool; SLOT_COUNT],
}

impl OccupancyMirror {
    pub const fn new() -> Self {
        Self {
            in_holder: [const { AtomicBool::new(false) }; SLOT_COUNT],
        }
    }

    pub fn set(&self, slot: SlotIndex, in_holder: bool) {
        self.in_holder[slot.index()].store(in_holder, Ordering::Release);
    }

    pub fn in_holder(&self, slot: SlotIndex) -> bool {
        self.in_holder[slot.index()].load(Ordering::Acquire)
    }

    /// Copy of every slot's committed occupancy.
    pub fn snapshot(&self) -> [bool; SLOT_COUNT] {
        core::array::from_fn(|i| self.in_holder[i].load(Ordering::Acquire))
    }
}

impl Default for OccupancyMirror {
    fn default() -> Self {
        Self::new()
    }
}
