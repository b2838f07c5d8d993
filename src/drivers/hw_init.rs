//! One-shot GPIO and interrupt initialization.
//!
//! Configures the slot switch inputs and LED outputs and installs the
//! per-pin ISRs using raw ESP-IDF sys calls. Called once from `main()`
//! before any task starts.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::app::slots::SlotIndex;
use crate::events::InterruptBridge;
use crate::pins::PinMap;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed { gpio: i32, rc: i32 },
    IsrInstallFailed(i32),
    IsrAddFailed { gpio: i32, rc: i32 },
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed { gpio, rc } => write!(f, "GPIO {} config failed (rc={})", gpio, rc),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={})", rc),
            Self::IsrAddFailed { gpio, rc } => write!(f, "GPIO {} ISR handler add failed (rc={})", gpio, rc),
        }
    }
}

impl std::error::Error for HwInitError {}

// ── GPIO ──────────────────────────────────────────────────────

/// Configure switch pins as any-edge interrupt inputs and LED pins as
/// outputs driven low.
#[cfg(target_os = "espidf")]
pub fn init_gpio(map: &PinMap, internal_pullup: bool) -> Result<(), HwInitError> {
    for pins in &map.slots {
        let input = gpio_config_t {
            pin_bit_mask: 1u64 << pins.switch,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: if internal_pullup {
                gpio_pullup_t_GPIO_PULLUP_ENABLE
            } else {
                gpio_pullup_t_GPIO_PULLUP_DISABLE
            },
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
        };
        // SAFETY: called once from main() before any task or ISR exists.
        let ret = unsafe { gpio_config(&input) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed { gpio: pins.switch, rc: ret });
        }

        let output = gpio_config_t {
            pin_bit_mask: 1u64 << pins.led,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: as above.
        let ret = unsafe { gpio_config(&output) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed { gpio: pins.led, rc: ret });
        }
        unsafe { gpio_set_level(pins.led, 0) };
    }

    info!("hw_init: slot GPIO configured (pull-up={})", internal_pullup);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_gpio(_map: &PinMap, _internal_pullup: bool) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): GPIO init skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulated switches read high: pull-up, no bottle seated.
#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an output pin configured in init_gpio();
    // callers serialise per pin through the LED bank.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── GPIO ISR Service ──────────────────────────────────────────

/// Per-pin ISR argument. Leaked at install time; ISRs live until reset.
#[cfg(target_os = "espidf")]
struct IsrBinding {
    bridge: &'static InterruptBridge,
    slot: SlotIndex,
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn slot_gpio_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: arg is the leaked IsrBinding registered for this pin in
    // install_slot_isrs(); it is never freed or mutated.
    let binding = unsafe { &*(arg as *const IsrBinding) };
    // A full ring drops the hint; the sensing task re-samples on its timeout.
    let _ = binding.bridge.push_from_isr(binding.slot);
}

/// Install the GPIO ISR service and register one handler per slot switch.
/// Call after `init_gpio()`.
#[cfg(target_os = "espidf")]
pub fn install_slot_isrs(bridge: &'static InterruptBridge, map: &PinMap) -> Result<(), HwInitError> {
    // SAFETY: ESP_ERR_INVALID_STATE means the service is already installed.
    let ret = unsafe { gpio_install_isr_service(0) };
    if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
        return Err(HwInitError::IsrInstallFailed(ret));
    }

    for slot in SlotIndex::all() {
        let gpio = map.slot(slot).switch;
        let arg = Box::into_raw(Box::new(IsrBinding { bridge, slot }));
        // SAFETY: the handler only touches the lock-free hint ring, and arg
        // stays valid for the lifetime of the firmware.
        let ret = unsafe { gpio_isr_handler_add(gpio, Some(slot_gpio_isr), arg.cast()) };
        if ret != ESP_OK as i32 {
            // SAFETY: registration failed, so the ISR never saw arg.
            drop(unsafe { Box::from_raw(arg) });
            return Err(HwInitError::IsrAddFailed { gpio, rc: ret });
        }
        unsafe { gpio_intr_enable(gpio) };
    }

    info!("hw_init: slot ISRs installed");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn install_slot_isrs(_bridge: &'static InterruptBridge, _map: &PinMap) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
