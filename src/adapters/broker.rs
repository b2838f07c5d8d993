//! Target-independent half of the broker adapter.
//!
//! Holds the baked-in TLS material and the mapping from the SDK's
//! connect-time error codes to [`SessionError`], so both can be checked
//! on the host.

use crate::error::SessionError;

// ── TLS material ──────────────────────────────────────────────

/// PEM certificates baked in at build time.
#[derive(Debug, Clone, Copy, Default)]
pub struct TlsCredentials {
    pub root_ca: Option<&'static str>,
    pub client_cert: Option<&'static str>,
    pub private_key: Option<&'static str>,
}

impl TlsCredentials {
    /// `PILLBUDDY_ROOT_CA_PEM`, `PILLBUDDY_CLIENT_CERT_PEM`,
    /// `PILLBUDDY_PRIVATE_KEY_PEM` hold the PEM text itself.
    pub fn from_build_env() -> Self {
        Self {
            root_ca: option_env!("PILLBUDDY_ROOT_CA_PEM"),
            client_cert: option_env!("PILLBUDDY_CLIENT_CERT_PEM"),
            private_key: option_env!("PILLBUDDY_PRIVATE_KEY_PEM"),
        }
    }
}

/// NUL-terminated PEM blobs that stay valid for the rest of the firmware.
#[derive(Debug, Clone, Copy, Default)]
pub struct StagedPem {
    pub root_ca: Option<&'static [u8]>,
    pub client_cert: Option<&'static [u8]>,
    pub private_key: Option<&'static [u8]>,
}

/// Stages the credentials on first use and hands out the same blobs on
/// every later connect.
///
/// The SDK keeps pointers into the PEM for as long as a client exists, so the
/// copies are leaked; staging at most once bounds that to one copy per boot.
#[derive(Debug)]
pub struct PemStore {
    credentials: TlsCredentials,
    staged: Option<StagedPem>,
}

impl PemStore {
    pub fn new(credentials: TlsCredentials) -> Self {
        Self { credentials, staged: None }
    }

    pub fn get(&mut self) -> StagedPem {
        let credentials = self.credentials;
        *self.staged.get_or_insert_with(|| StagedPem {
            root_ca: nul_terminated(credentials.root_ca),
            client_cert: nul_terminated(credentials.client_cert),
            private_key: nul_terminated(credentials.private_key),
        })
    }
}

fn nul_terminated(text: Option<&'static str>) -> Option<&'static [u8]> {
    let text = text?;
    let mut owned = Vec::with_capacity(text.len() + 1);
    owned.extend_from_slice(text.as_bytes());
    owned.push(0);
    Some(Box::leak(owned.into_boxed_slice()))
}

// ── Connect failure classification ────────────────────────────

/// `ESP_ERR_ESP_TLS_BASE` and the esp-tls / mbedTLS codes under it.
const ESP_TLS_BASE: i32 = 0x8000;
const TLS_CANNOT_RESOLVE_HOSTNAME: i32 = ESP_TLS_BASE + 0x01;
const TLS_CANNOT_CREATE_SOCKET: i32 = ESP_TLS_BASE + 0x02;
const TLS_CONNECTION_TIMEOUT: i32 = ESP_TLS_BASE + 0x06;
const TLS_TCP_CLOSED_FIN: i32 = ESP_TLS_BASE + 0x08;
const MBEDTLS_FIRST: i32 = ESP_TLS_BASE + 0x10;
const MBEDTLS_LAST: i32 = ESP_TLS_BASE + 0x1C;

/// MQTT 3.1.1 CONNACK return codes for a refused connection.
const CONNACK_BAD_CREDENTIALS: i32 = 4;
const CONNACK_NOT_AUTHORIZED: i32 = 5;

/// Map the last error the client reported before a failed CONNECT.
///
/// Without a recognisable code the broker simply did not take the
/// connection.
pub fn classify_connect_failure(last_error: Option<i32>) -> SessionError {
    match last_error {
        Some(TLS_CANNOT_RESOLVE_HOSTNAME) => SessionError::UnknownHost,
        Some(TLS_CANNOT_CREATE_SOCKET..=TLS_CONNECTION_TIMEOUT) => SessionError::ConnectRefused,
        Some(TLS_TCP_CLOSED_FIN) => SessionError::TlsRead,
        Some(MBEDTLS_FIRST..=MBEDTLS_LAST) => SessionError::TlsHandshake,
        Some(CONNACK_BAD_CREDENTIALS | CONNACK_NOT_AUTHORIZED) => SessionError::NotAuthorized,
        _ => SessionError::ConnectRefused,
    }
}
