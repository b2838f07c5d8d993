//! Unified error types for the PillBuddy node firmware.
//!
//! Every subsystem error converts into [`Error`], so boot-time code can
//! funnel failures through one type. All variants are `Copy` so they pass
//! between tasks without allocation.

use core::fmt;

use crate::app::slots::SlotIndex;
use crate::drivers::hw_init::HwInitError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The slot pin map is invalid or conflicting.
    PinConfig(PinConfigError),
    /// Configuration is invalid or topics could not be derived.
    Config(ConfigError),
    /// The messaging session reported a failure.
    Session(SessionError),
    /// An inbound command was rejected.
    Command(CommandError),
    /// An event queue refused an item.
    Queue(QueueError),
    /// GPIO or interrupt setup failed.
    Hardware(HwInitError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PinConfig(e) => write!(f, "pin config: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Session(e) => write!(f, "session: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Queue(e) => write!(f, "queue: {e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Pin map errors
// ---------------------------------------------------------------------------

/// A single problem found while validating the slot pin map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinConfigError {
    /// The switch pin is not a GPIO that exists on this chip.
    InvalidSwitchPin { slot: SlotIndex, gpio: i32 },
    /// The LED pin cannot drive an output.
    InvalidLedPin { slot: SlotIndex, gpio: i32 },
    /// A slot uses one pin for both its switch and its LED.
    SwitchLedSamePin { slot: SlotIndex, gpio: i32 },
    /// Two slots share a switch pin.
    DuplicateSwitchPin { first: SlotIndex, second: SlotIndex, gpio: i32 },
    /// Two slots share an LED pin.
    DuplicateLedPin { first: SlotIndex, second: SlotIndex, gpio: i32 },
    /// One slot's switch pin is another slot's LED pin.
    SwitchIsForeignLed { switch_slot: SlotIndex, led_slot: SlotIndex, gpio: i32 },
}

impl fmt::Display for PinConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::InvalidSwitchPin { slot, gpio } => {
                write!(f, "slot {slot} switch GPIO {gpio} is not a valid GPIO")
            }
            Self::InvalidLedPin { slot, gpio } => {
                write!(f, "slot {slot} LED GPIO {gpio} is not output-capable")
            }
            Self::SwitchLedSamePin { slot, gpio } => {
                write!(f, "slot {slot} uses GPIO {gpio} for both switch and LED")
            }
            Self::DuplicateSwitchPin { first, second, gpio } => {
                write!(f, "slots {first} and {second} share switch GPIO {gpio}")
            }
            Self::DuplicateLedPin { first, second, gpio } => {
                write!(f, "slots {first} and {second} share LED GPIO {gpio}")
            }
            Self::SwitchIsForeignLed { switch_slot, led_slot, gpio } => write!(
                f,
                "slot {switch_slot} switch GPIO {gpio} is also slot {led_slot} LED"
            ),
        }
    }
}

impl From<PinConfigError> for Error {
    fn from(e: PinConfigError) -> Self {
        Self::PinConfig(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Debounce window of zero would commit on the second sample.
    ZeroDebounceWindow,
    EmptyDeviceId,
    EmptyClientId,
    EmptyBrokerHost,
    /// The session mutex acquisition bound must be non-zero.
    ZeroMutexTimeout,
    /// A derived topic does not fit its fixed-capacity buffer.
    TopicTooLong,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDebounceWindow => write!(f, "debounce window must be > 0 ms"),
            Self::EmptyDeviceId => write!(f, "device id is empty"),
            Self::EmptyClientId => write!(f, "client id is empty"),
            Self::EmptyBrokerHost => write!(f, "broker host is empty"),
            Self::ZeroMutexTimeout => write!(f, "session mutex timeout must be > 0 ms"),
            Self::TopicTooLong => write!(f, "derived topic exceeds buffer"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// A QoS 1 publish was sent but the broker ack did not arrive in time.
    AckTimeout,
    /// The broker rejected the client's credentials or policy.
    NotAuthorized,
    TlsHandshake,
    /// TLS record read failed, typically the broker closing on a policy fault.
    TlsRead,
    /// Broker host name could not be resolved.
    UnknownHost,
    /// The broker did not accept the connection.
    ConnectRefused,
    /// Operation needs a connected session.
    Disconnected,
    /// Operation needs the session object to be constructed first.
    NotInitialized,
    /// Outbound payload could not be encoded.
    Encode,
    /// Any other transport failure, with the SDK's error code.
    Transport(i32),
}

impl SessionError {
    /// Stable identifier for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Self::AckTimeout => "ACK_TIMEOUT",
            Self::NotAuthorized => "NOT_AUTHORIZED",
            Self::TlsHandshake => "TLS_HANDSHAKE_ERROR",
            Self::TlsRead => "TLS_READ_ERROR",
            Self::UnknownHost => "UNKNOWN_HOST",
            Self::ConnectRefused => "CONNECT_REFUSED",
            Self::Disconnected => "DISCONNECTED",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::Encode => "ENCODE_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    /// Extra operator guidance for failures that usually mean a
    /// provisioning mistake rather than a flaky network.
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::NotAuthorized => Some(
                "broker rejected the client: check that the certificate is active, \
                 its policy allows this client id and topics, and the endpoint is right",
            ),
            Self::TlsRead => Some(
                "broker closed the TLS stream: usually a policy or certificate/key \
                 mismatch, or an endpoint in another account/region",
            ),
            _ => None,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(code) => write!(f, "{} ({})", self.name(), code),
            _ => f.write_str(self.name()),
        }
    }
}

impl From<SessionError> for Error {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Not JSON, or `action`/`slot` missing or of the wrong type.
    Malformed,
    /// `action` is neither `turn_on` nor `turn_off`.
    UnknownAction,
    /// `slot` is outside `1..=SLOT_COUNT`.
    SlotOutOfRange(i64),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed command"),
            Self::UnknownAction => write!(f, "unknown action"),
            Self::SlotOutOfRange(n) => write!(f, "slot {n} out of range"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

// ---------------------------------------------------------------------------
// Queue errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue stayed full for the whole wait.
    Full,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "queue full"),
        }
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
