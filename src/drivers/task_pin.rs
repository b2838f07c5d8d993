//! Core-pinned thread spawning for the ESP32 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority
//! and stack size. On non-ESP targets, falls back to plain thread spawn.
//!
//! `esp_pthread_set_cfg()` sets thread-local configuration that applies to
//! the *next* `pthread_create()` from the calling thread, so the
//! config→spawn pair must not be interleaved with other thread creation.

use std::io;
use std::thread::JoinHandle;

/// Core 1 (APP_CPU). Core 0 stays with Wi-Fi and lwIP.
pub const APP_CORE: i32 = 1;

/// How a node task is placed on the scheduler. Every node task runs on
/// [`APP_CORE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    /// Null-terminated FreeRTOS task name, e.g. `"sensing\0"`.
    pub name: &'static str,
    pub priority: u8,
    pub stack_kb: usize,
}

/// Debounce latency matters most, so sensing outranks the broker tasks.
pub const SENSING_TASK: TaskSpec = TaskSpec { name: "sensing\0", priority: 6, stack_kb: 4 };
pub const PUBLISHER_TASK: TaskSpec = TaskSpec { name: "publisher\0", priority: 5, stack_kb: 4 };
/// TLS needs the deep stack.
pub const SESSION_TASK: TaskSpec = TaskSpec { name: "session\0", priority: 5, stack_kb: 10 };

/// Spawn a thread pinned to a specific core with explicit priority and stack.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    // SAFETY: esp_create_default_pthread_config returns a plain struct;
    // thread_name points at a 'static null-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = APP_CORE;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as _;
        cfg.thread_name = spec.name.as_ptr() as *const _;
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = spec.name.trim_end_matches('\0');
    log::info!(
        "BOOT: spawning '{}' on core {} (pri={}, stack={}KB)",
        display_name,
        APP_CORE,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new().name(display_name.into()).spawn(f)
}

/// Simulation fallback; ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(spec: TaskSpec, f: impl FnOnce() + Send + 'static) -> io::Result<JoinHandle<()>> {
    let display_name = spec.name.trim_end_matches('\0');
    log::info!(
        "BOOT: spawning '{}' (sim, no core pinning, stack={}KB)",
        display_name,
        spec.stack_kb
    );

    // Host threads need far more than the on-target stack for std + test harness.
    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size((spec.stack_kb * 1024).max(256 * 1024))
        .spawn(f)
}
