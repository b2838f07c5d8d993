//! GPIO adapter: slot switches and LEDs as `embedded-hal` pins.
//!
//! The pins are configured once by [`hw_init::init_gpio`]; these handles
//! only read and write levels through the same raw calls. On non-espidf
//! targets the calls are simulation stubs (switches read high, writes are
//! dropped).

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::app::slots::SLOT_COUNT;
use crate::drivers::hw_init;
use crate::pins::PinMap;

/// A slot microswitch input.
#[derive(Debug)]
pub struct SlotSwitch {
    gpio: i32,
}

impl SlotSwitch {
    pub const fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    pub const fn gpio(&self) -> i32 {
        self.gpio
    }
}

impl ErrorType for SlotSwitch {
    type Error = Infallible;
}

impl InputPin for SlotSwitch {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(hw_init::gpio_read(self.gpio))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!hw_init::gpio_read(self.gpio))
    }
}

/// A slot indicator LED output.
#[derive(Debug)]
pub struct SlotLed {
    gpio: i32,
}

impl SlotLed {
    pub const fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    pub const fn gpio(&self) -> i32 {
        self.gpio
    }
}

impl ErrorType for SlotLed {
    type Error = Infallible;
}

impl OutputPin for SlotLed {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, true);
        Ok(())
    }
}

/// Switch and LED handles for every slot, in slot order.
pub fn slot_pins(map: &PinMap) -> ([SlotSwitch; SLOT_COUNT], [SlotLed; SLOT_COUNT]) {
    (
        map.slots.map(|p| SlotSwitch::new(p.switch)),
        map.slots.map(|p| SlotLed::new(p.led)),
    )
}
