//! Application core: pure domain logic, zero I/O.
//!
//! Slot model, debouncing, occupancy events, LED commands, readiness and
//! the delivery queue. Hardware and the broker are reached only through
//! `embedded-hal` pins and the [`ports::SessionClient`] trait, so this layer
//! is fully testable on the host.

pub mod commands;
pub mod debounce;
pub mod delivery;
pub mod events;
pub mod ports;
pub mod readiness;
pub mod session;
pub mod slots;
