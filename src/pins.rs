//! GPIO pin assignments for the PillBuddy holder board.
//!
//! Single source of truth for slot switch and LED pins. Flash builds can
//! move any pin through the build environment
//! (`PILLBUDDY_SLOT<N>_SWITCH_GPIO` / `PILLBUDDY_SLOT<N>_LED_GPIO`); the map
//! is validated at boot and a bad map stops the node before any task starts.

use heapless::Vec;
use log::warn;

use crate::app::slots::{SLOT_COUNT, SlotIndex};
use crate::error::PinConfigError;

// ---------------------------------------------------------------------------
// Default wiring
// ---------------------------------------------------------------------------

/// Slot microswitches, closed to ground when a bottle is seated.
pub const SLOT1_SWITCH_GPIO: i32 = 25;
pub const SLOT2_SWITCH_GPIO: i32 = 26;
pub const SLOT3_SWITCH_GPIO: i32 = 27;

/// Slot indicator LEDs, active high.
pub const SLOT1_LED_GPIO: i32 = 16;
pub const SLOT2_LED_GPIO: i32 = 17;
pub const SLOT3_LED_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// ESP32 GPIO capabilities
// ---------------------------------------------------------------------------

/// Highest GPIO number on the ESP32.
pub const MAX_GPIO: i32 = 39;

/// GPIOs 34–39 are input-only and have no internal pull resistors.
pub const INPUT_ONLY_GPIO_MIN: i32 = 34;

/// GPIO numbers that exist on the chip.
pub const fn is_valid_gpio(gpio: i32) -> bool {
    matches!(gpio, 0..=19 | 21..=23 | 25..=27 | 32..=39)
}

/// GPIO numbers that can drive an output.
pub const fn is_valid_output_gpio(gpio: i32) -> bool {
    is_valid_gpio(gpio) && gpio < INPUT_ONLY_GPIO_MIN
}

pub const fn is_input_only(gpio: i32) -> bool {
    gpio >= INPUT_ONLY_GPIO_MIN && gpio <= MAX_GPIO
}

// ---------------------------------------------------------------------------
// Pin map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPins {
    pub switch: i32,
    pub led: i32,
}

/// Switch and LED pin for every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    pub slots: [SlotPins; SLOT_COUNT],
}

/// Worst case: three per-slot faults, two duplicate checks per slot pair and
/// one foreign-LED check per ordered pair.
pub const MAX_PIN_ERRORS: usize = 3 * SLOT_COUNT + 2 * SLOT_COUNT * (SLOT_COUNT - 1);

pub type PinErrors = Vec<PinConfigError, MAX_PIN_ERRORS>;

impl PinMap {
    pub const DEFAULT: Self = Self {
        slots: [
            SlotPins { switch: SLOT1_SWITCH_GPIO, led: SLOT1_LED_GPIO },
            SlotPins { switch: SLOT2_SWITCH_GPIO, led: SLOT2_LED_GPIO },
            SlotPins { switch: SLOT3_SWITCH_GPIO, led: SLOT3_LED_GPIO },
        ],
    };

    pub fn slot(&self, slot: SlotIndex) -> SlotPins {
        self.slots[slot.index()]
    }

    /// Default wiring with build-time overrides applied.
    pub fn from_build_env() -> Self {
        let overrides: [[Option<&str>; 2]; SLOT_COUNT] = [
            [option_env!("PILLBUDDY_SLOT1_SWITCH_GPIO"), option_env!("PILLBUDDY_SLOT1_LED_GPIO")],
            [option_env!("PILLBUDDY_SLOT2_SWITCH_GPIO"), option_env!("PILLBUDDY_SLOT2_LED_GPIO")],
            [option_env!("PILLBUDDY_SLOT3_SWITCH_GPIO"), option_env!("PILLBUDDY_SLOT3_LED_GPIO")],
        ];

        let mut map = Self::DEFAULT;
        for (pins, [switch, led]) in map.slots.iter_mut().zip(overrides) {
            apply_override(&mut pins.switch, switch);
            apply_override(&mut pins.led, led);
        }
        map
    }
}

impl Default for PinMap {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn apply_override(pin: &mut i32, value: Option<&str>) {
    let Some(value) = value else { return };
    match value.trim().parse() {
        Ok(gpio) => *pin = gpio,
        Err(_) => warn!("PINS: ignoring non-numeric GPIO override {:?}", value),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check every rule and report all problems, not just the first.
pub fn validate(map: &PinMap) -> Result<(), PinErrors> {
    let mut errors = PinErrors::new();
    let mut report = |e| {
        // Sized for the worst case, cannot overflow.
        let _ = errors.push(e);
    };

    for slot in SlotIndex::all() {
        let SlotPins { switch, led } = map.slot(slot);
        if !is_valid_gpio(switch) {
            report(PinConfigError::InvalidSwitchPin { slot, gpio: switch });
        }
        if !is_valid_output_gpio(led) {
            report(PinConfigError::InvalidLedPin { slot, gpio: led });
        }
        if switch == led {
            report(PinConfigError::SwitchLedSamePin { slot, gpio: switch });
        }
    }

    for first in SlotIndex::all() {
        for second in SlotIndex::all().filter(|s| *s > first) {
            let a = map.slot(first);
            let b = map.slot(second);
            if a.switch == b.switch {
                report(PinConfigError::DuplicateSwitchPin { first, second, gpio: a.switch });
            }
            if a.led == b.led {
                report(PinConfigError::DuplicateLedPin { first, second, gpio: a.led });
            }
        }
    }

    for switch_slot in SlotIndex::all() {
        for led_slot in SlotIndex::all().filter(|s| *s != switch_slot) {
            let gpio = map.slot(switch_slot).switch;
            if gpio == map.slot(led_slot).led {
                report(PinConfigError::SwitchIsForeignLed { switch_slot, led_slot, gpio });
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Slots whose switch sits on an input-only pin while the internal pull-up
/// is requested. Those pins have no pull resistor, so the board needs an
/// external one.
pub fn pullup_warnings(map: &PinMap, internal_pullup: bool) -> Vec<(SlotIndex, i32), SLOT_COUNT> {
    let mut out = Vec::new();
    if !internal_pullup {
        return out;
    }
    for slot in SlotIndex::all() {
        let gpio = map.slot(slot).switch;
        if is_input_only(gpio) {
            let _ = out.push((slot, gpio));
        }
    }
    out
}
