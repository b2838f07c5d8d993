//! PillBuddy node firmware library.
//!
//! Three-slot pill holder: debounced slot switches, per-slot LEDs and an
//! MQTT-over-TLS session that publishes occupancy changes and takes LED
//! commands. Everything here builds and tests on the host; ESP-IDF code is
//! guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod context;
pub mod drivers;
pub mod error;
pub mod events;
pub mod pins;
pub mod tasks;
