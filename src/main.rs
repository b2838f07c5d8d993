//! PillBuddy Firmware: Main Entry Point
//!
//! Boots the node, validates the pin map, seeds the slots and spawns the
//! three node tasks. The boot thread then stays behind to drive the Wi-Fi
//! link.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │  SlotSwitch / SlotLed     EspSession          LinkAdapter    │
//! │  (InputPin / OutputPin)   (SessionClient)     (link-up bit)  │
//! │                                                              │
//! │  ─────────────────── NodeContext (shared) ───────────────    │
//! │                                                              │
//! │  core 1: SensingTask ──▶ DeliveryQueue ──▶ PublisherTask     │
//! │          SessionManager ◀──▶ session mutex ◀──┘              │
//! │                                                              │
//! │  ISR ──▶ InterruptBridge ──▶ SensingTask                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use futures_lite::future::block_on;
use log::{error, info, warn};

use pillbuddy::adapters::gpio::slot_pins;
use pillbuddy::adapters::broker::TlsCredentials;
use pillbuddy::adapters::mqtt::EspSession;
use pillbuddy::adapters::wifi::LinkAdapter;
use pillbuddy::config::NodeConfig;
use pillbuddy::context::NodeContext;
use pillbuddy::drivers::{hw_init, task_pin};
use pillbuddy::pins::{self, PinMap};
use pillbuddy::tasks::publisher::PublisherTask;
use pillbuddy::tasks::sensing::SensingTask;
use pillbuddy::tasks::session::SessionManager;

/// Cadence of the link supervision loop on the boot thread.
const LINK_POLL_INTERVAL: Duration = Duration::from_millis(500);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PillBuddy v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration and pin map ──────────────────────────
    let config = NodeConfig::from_build_env();
    let pin_map = PinMap::from_build_env();

    if let Err(errors) = pins::validate(&pin_map) {
        for e in &errors {
            error!("BOOT: pin config: {}", e);
        }
        bail!("invalid pin configuration ({} problems)", errors.len());
    }
    for (slot, gpio) in pins::pullup_warnings(&pin_map, config.switch_internal_pullup) {
        warn!(
            "BOOT: slot {} switch GPIO {} is input-only, internal pull-up ignored; fit an external pull-up",
            slot, gpio
        );
    }
    info!(
        "BOOT: device={} broker={}:{} debounce={} ms",
        config.device_id, config.broker_host, config.broker_port, config.debounce_ms
    );

    // ── 3. GPIO ───────────────────────────────────────────────
    hw_init::init_gpio(&pin_map, config.switch_internal_pullup)?;

    // ── 4. Wi-Fi station ──────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let wifi = BlockingWifi::wrap(EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs))?, sysloop)?;
    let mut link = LinkAdapter::new(wifi);
    link.set_credentials(&config.wifi_ssid, &config.wifi_password)?;

    // ── 5. Shared context ─────────────────────────────────────
    let (switches, leds) = slot_pins(&pin_map);
    let session = EspSession::new(TlsCredentials::from_build_env());
    let ctx = Arc::new(NodeContext::new(config, session, leds)?);

    ctx.leds.set_all(ctx.config.leds_on_at_boot);
    let mut sensing = SensingTask::new(Arc::clone(&ctx), switches);
    sensing.seed();

    // The ISR argument must outlive every interrupt, i.e. the firmware.
    let isr_ctx = Box::leak(Box::new(Arc::clone(&ctx)));
    hw_init::install_slot_isrs(&isr_ctx.hints, &pin_map)?;

    // ── 6. Node tasks ─────────────────────────────────────────
    task_pin::spawn_on_core(task_pin::SENSING_TASK, move || block_on(sensing.run()))?;

    let publisher = PublisherTask::new(Arc::clone(&ctx));
    task_pin::spawn_on_core(task_pin::PUBLISHER_TASK, move || block_on(publisher.run()))?;

    let manager = SessionManager::new(Arc::clone(&ctx));
    task_pin::spawn_on_core(task_pin::SESSION_TASK, move || block_on(manager.run()))?;

    // ── 7. Link supervision ───────────────────────────────────
    if let Err(e) = link.connect(&ctx.readiness) {
        warn!("BOOT: first Wi-Fi attempt failed ({}), retrying in background", e);
    }
    info!("BOOT: tasks running");

    loop {
        link.poll(&ctx.readiness);
        std::thread::sleep(LINK_POLL_INTERVAL);
    }
}
