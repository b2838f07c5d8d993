//! Interrupt bridge: GPIO edge hints from ISR context to the sensing task.
//!
//! A hint only says "slot N may have changed". The sensing task re-reads
//! every switch anyway, so a hint dropped on a full ring costs latency
//! (bounded by the sensing wait), never correctness.
//!
//! ```text
//! ┌────────────┐   push_from_isr   ┌──────────────┐   pop   ┌──────────────┐
//! │ GPIO ISR   │──────────────────▶│  hint ring   │────────▶│ sensing task │
//! │ (any slot) │                   │  (lock-free) │         │  (consumer)  │
//! └────────────┘                   └──────────────┘         └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, Ordering};

use crate::app::slots::SlotIndex;

/// Hints the ring can hold before new ones are dropped.
pub const HINT_QUEUE_CAPACITY: usize = 16;

// One slot stays empty to tell "full" from "empty".
const RING_LEN: usize = HINT_QUEUE_CAPACITY + 1;

/// "Slot N may have changed", carried from ISR to task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptHint {
    pub slot: SlotIndex,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// The GPIO ISR service dispatches pin handlers one after another on the
// core that installed it, so there is a single producer. The sensing task
// is the single consumer. Slots hold the zero-based slot index.

/// Fixed-capacity hint ring, safe to push from interrupt context.
///
/// Never allocates, locks, blocks or logs on the push side.
pub struct InterruptBridge {
    head: AtomicU8,
    tail: AtomicU8,
    buf: [AtomicU8; RING_LEN],
}

impl InterruptBridge {
    pub const fn new() -> Self {
        Self {
            head: AtomicU8::new(0),
            tail: AtomicU8::new(0),
            buf: [const { AtomicU8::new(0) }; RING_LEN],
        }
    }

    /// Record a hint. Returns `false` if the ring is full and the hint was
    /// dropped.
    pub fn push_from_isr(&self, slot: SlotIndex) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let next_head = (head + 1) % RING_LEN as u8;

        if next_head == tail {
            return false;
        }

        self.buf[head as usize].store(slot.index() as u8, Ordering::Relaxed);
        self.head.store(next_head, Ordering::Release);
        true
    }

    /// Take the oldest pending hint.
    pub fn pop(&self) -> Option<InterruptHint> {
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Acquire);

            if tail == head {
                return None;
            }

            let raw = self.buf[tail as usize].load(Ordering::Relaxed);
            self.tail.store((tail + 1) % RING_LEN as u8, Ordering::Release);

            // Unknown indices cannot be produced through `push_from_isr`; skip them.
            if let Some(slot) = SlotIndex::new(raw as usize) {
                return Some(InterruptHint { slot });
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Acquire)
    }

    /// Number of pending hints.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire) as usize;
        let tail = self.tail.load(Ordering::Relaxed) as usize;
        (head + RING_LEN - tail) % RING_LEN
    }

    /// Drop every pending hint. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.pop().is_some() {
            dropped += 1;
        }
        dropped
    }
}

impl Default for InterruptBridge {
    fn default() -> Self {
        Self::new()
    }
}
