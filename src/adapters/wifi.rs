//! Wi-Fi station-mode link adapter.
//!
//! Owns the station connection and mirrors it into the link-up bit of the
//! [`ReadinessSignal`]. The boot thread calls [`LinkAdapter::poll`] forever;
//! that is the only place link state changes.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF Wi-Fi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: a simulated access point for host-side tests.
//!
//! ## Reconnection policy
//!
//! After a failed association or a dropped link the adapter waits a fixed
//! [`RETRY_DELAY`] before the next attempt, indefinitely.

use core::fmt;

use embassy_time::{Duration, Instant};
use log::{error, info, warn};

use crate::app::readiness::ReadinessSignal;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no Wi-Fi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "Wi-Fi connection failed"),
        }
    }
}

impl std::error::Error for LinkError {}

// ───────────────────────────────────────────────────────────────
// Link state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Up,
    Retrying { attempt: u32 },
}

pub const RETRY_DELAY: Duration = Duration::from_secs(1);

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Link adapter
// ───────────────────────────────────────────────────────────────

pub struct LinkAdapter {
    state: LinkState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    retry_delay: Duration,
    retry_at: Instant,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    /// Simulation: whether the access point currently answers.
    #[cfg(not(target_os = "espidf"))]
    sim_ap_available: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_attempts: u32,
}

impl LinkAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
        Self {
            state: LinkState::Down,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            retry_delay: RETRY_DELAY,
            retry_at: Instant::MIN,
            wifi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            state: LinkState::Down,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            retry_delay: RETRY_DELAY,
            retry_at: Instant::MIN,
            sim_ap_available: true,
            sim_attempts: 0,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| LinkError::InvalidSsid)?;
        self.password.clear();
        self.password.push_str(password).map_err(|_| LinkError::InvalidPassword)?;
        info!("LINK: credentials set (SSID='{}')", self.ssid);
        Ok(())
    }

    /// First association attempt. On failure the adapter keeps retrying
    /// from [`poll`](Self::poll).
    pub fn connect(&mut self, readiness: &ReadinessSignal) -> Result<(), LinkError> {
        if self.ssid.is_empty() {
            return Err(LinkError::NoCredentials);
        }
        info!("LINK: connecting to '{}'", self.ssid);
        match self.platform_connect() {
            Ok(()) => {
                self.mark_up(readiness);
                Ok(())
            }
            Err(e) => {
                error!("LINK: connection failed: {}", e);
                self.schedule_retry(0);
                Err(e)
            }
        }
    }

    /// Drive reconnects and detect link loss. Call periodically.
    pub fn poll(&mut self, readiness: &ReadinessSignal) {
        match self.state {
            LinkState::Up => {
                if !self.platform_is_connected() {
                    warn!("LINK: disconnected, session readiness cleared");
                    readiness.clear_link_up();
                    self.schedule_retry(0);
                }
            }
            LinkState::Retrying { attempt } => {
                if Instant::now() < self.retry_at {
                    return;
                }
                info!("LINK: reconnect attempt {}", attempt + 1);
                match self.platform_connect() {
                    Ok(()) => self.mark_up(readiness),
                    Err(_) => self.schedule_retry(attempt + 1),
                }
            }
            LinkState::Down => {}
        }
    }

    fn mark_up(&mut self, readiness: &ReadinessSignal) {
        self.state = LinkState::Up;
        readiness.set_link_up();
        info!("LINK: up");
    }

    fn schedule_retry(&mut self, attempt: u32) {
        self.state = LinkState::Retrying { attempt };
        self.retry_at = Instant::now() + self.retry_delay;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.clone(),
            password: self.password.clone(),
            auth_method,
            ..Default::default()
        });

        let result = (|| -> Result<(), esp_idf_svc::sys::EspError> {
            self.wifi.set_configuration(&config)?;
            if !self.wifi.is_started()? {
                self.wifi.start()?;
            }
            self.wifi.connect()?;
            self.wifi.wait_netif_up()
        })();

        match result {
            Ok(()) => {
                if let Ok(ip) = self.wifi.wifi().sta_netif().get_ip_info() {
                    info!("LINK: got IP {}", ip.ip);
                }
                Ok(())
            }
            Err(e) => {
                warn!("LINK: association failed: {}", e);
                Err(LinkError::ConnectionFailed)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), LinkError> {
        self.sim_attempts = self.sim_attempts.wrapping_add(1);
        if !self.sim_ap_available {
            warn!("LINK(sim): access point unreachable (attempt {})", self.sim_attempts);
            return Err(LinkError::ConnectionFailed);
        }
        info!("LINK(sim): connected to '{}' (attempt {})", self.ssid, self.sim_attempts);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_ap_available
    }

    // ── Simulation controls ───────────────────────────────────

    /// Make the simulated access point (un)reachable.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_set_ap_available(&mut self, available: bool) {
        self.sim_ap_available = available;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_attempts(&self) -> u32 {
        self.sim_attempts
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for LinkAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
