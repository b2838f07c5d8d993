//! Inbound LED commands from the broker.
//!
//! Messages on the command topic look like
//! `{"action":"turn_on","slot":2}`. Anything else is rejected and logged;
//! a rejected command never changes LED state.

use embedded_hal::digital::OutputPin;
use log::{info, warn};
use serde::Deserialize;

use super::slots::{LedBank, SlotIndex};
use crate::error::CommandError;

/// Longest payload prefix echoed into logs.
pub const MAX_LOGGED_PAYLOAD: usize = 160;

#[derive(Deserialize)]
struct WireCommand {
    action: String,
    slot: i64,
}

/// A validated request to drive one slot's LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedCommand {
    pub slot: SlotIndex,
    pub turn_on: bool,
}

impl LedCommand {
    /// Parse and validate a command payload. Unknown extra fields are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, CommandError> {
        let wire: WireCommand =
            serde_json::from_slice(payload).map_err(|_| CommandError::Malformed)?;

        let turn_on = match wire.action.as_str() {
            "turn_on" => true,
            "turn_off" => false,
            _ => return Err(CommandError::UnknownAction),
        };
        let slot = SlotIndex::from_number(wire.slot).ok_or(CommandError::SlotOutOfRange(wire.slot))?;

        Ok(Self { slot, turn_on })
    }

    pub fn action(&self) -> &'static str {
        if self.turn_on { "turn_on" } else { "turn_off" }
    }
}

/// Applies decoded commands to the LED bank.
///
/// Runs in the session manager's context, called from the client's message
/// dispatch while the session lock is held. It only touches LED cells.
pub struct CommandHandler<'a, L> {
    leds: &'a LedBank<L>,
}

impl<'a, L: OutputPin> CommandHandler<'a, L> {
    pub fn new(leds: &'a LedBank<L>) -> Self {
        Self { leds }
    }

    pub fn handle(&self, topic: &str, payload: &[u8]) -> Result<LedCommand, CommandError> {
        let shown = &payload[..payload.len().min(MAX_LOGGED_PAYLOAD)];
        let shown = String::from_utf8_lossy(shown);
        info!("CMD: topic={} payload={}", topic, shown);

        match LedCommand::decode(payload) {
            Ok(cmd) => {
                self.leds.set(cmd.slot, cmd.turn_on);
                info!("CMD: applied slot={} action={}", cmd.slot, cmd.action());
                Ok(cmd)
            }
            Err(e) => {
                warn!("CMD: rejected ({}): {}", e, shown);
                Err(e)
            }
        }
    }
}
