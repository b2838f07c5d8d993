//! Adapters: concrete implementations of the hexagonal ports.
//!
//! | Adapter | Implements                  | Connects to               |
//! |---------|-----------------------------|---------------------------|
//! | `broker`| TLS material, connect errors | (used by `mqtt`)      |
//! | `gpio`  | `InputPin` / `OutputPin`    | ESP32 GPIO (slot pins)    |
//! | `mqtt`  | `SessionClient`             | ESP-IDF MQTT over TLS     |
//! | `wifi`  | link-up readiness           | ESP-IDF Wi-Fi STA         |

pub mod broker;
pub mod gpio;
#[cfg(target_os = "espidf")]
pub mod mqtt;
pub mod wifi;
