//! Delivery queue: committed occupancy events waiting to be published.
//!
//! ```text
//! ┌──────────────┐  OccupancyEvent  ┌────────────────┐
//! │ Sensing task │─────────────────▶│ Publisher task │
//! │ (producer)   │   bounded FIFO   │ (consumer)     │
//! └──────────────┘                  └────────────────┘
//! ```
//!
//! The producer waits a bounded time when the queue is full and then drops
//! the event; the consumer blocks indefinitely.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, with_timeout};

use super::events::OccupancyEvent;
use crate::error::QueueError;

/// Events held before the producer starts dropping.
pub const DELIVERY_QUEUE_CAPACITY: usize = 16;

pub struct DeliveryQueue {
    channel: Channel<CriticalSectionRawMutex, OccupancyEvent, DELIVERY_QUEUE_CAPACITY>,
}

impl DeliveryQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue without waiting.
    pub fn try_enqueue(&self, event: OccupancyEvent) -> Result<(), QueueError> {
        self.channel.try_send(event).map_err(|_| QueueError::Full)
    }

    /// Enqueue, waiting at most `timeout` for space.
    pub async fn enqueue_timeout(&self, event: OccupancyEvent, timeout: Duration) -> Result<(), QueueError> {
        with_timeout(timeout, self.channel.send(event))
            .await
            .map_err(|_| QueueError::Full)
    }

    /// Wait for the oldest event.
    pub async fn dequeue(&self) -> OccupancyEvent {
        self.channel.receive().await
    }

    pub fn try_dequeue(&self) -> Option<OccupancyEvent> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        DELIVERY_QUEUE_CAPACITY
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}
