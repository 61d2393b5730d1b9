//! Connection configuration.
//!
//! Every field has a default, so a partial document deserializes:
//!
//! ```
//! use ampwire::config::ConnectionConfig;
//!
//! let config: ConnectionConfig = serde_json::from_str(r#"{"max_concurrent_responders": 8}"#).unwrap();
//! assert_eq!(config.max_concurrent_responders, 8);
//! assert_eq!(config.read_buffer_size, 64 * 1024);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bytes per transport read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default number of concurrently running responders per connection.
pub const DEFAULT_MAX_CONCURRENT_RESPONDERS: usize = 256;

/// Default TLS handshake timeout in milliseconds.
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Per-connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Bytes requested per transport read.
    pub read_buffer_size: usize,
    /// Responders allowed to run at once. Further asks wait for a slot.
    pub max_concurrent_responders: usize,
    /// Milliseconds allowed for a TLS handshake.
    pub tls_handshake_timeout: u64,
}

impl ConnectionConfig {
    /// TLS handshake timeout as a `Duration`.
    pub fn tls_handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.tls_handshake_timeout)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_concurrent_responders: DEFAULT_MAX_CONCURRENT_RESPONDERS,
            tls_handshake_timeout: DEFAULT_TLS_HANDSHAKE_TIMEOUT_MS,
        }
    }
}

/// PEM material for [`RustlsProvider`](crate::transport::RustlsProvider).
#[derive(Clone, Serialize, Deserialize)]
pub struct TlsSettings {
    /// Certificate chain, leaf first.
    pub certificate_pem: String,
    /// Private key for the leaf certificate.
    pub private_key_pem: String,
    /// Authorities trusted to sign the peer's certificate.
    #[serde(default)]
    pub trusted_authorities_pem: Option<String>,
    /// Name to verify when acting as TLS client.
    #[serde(default)]
    pub server_name: Option<String>,
}

impl TlsSettings {
    /// Create settings from a certificate chain and key.
    pub fn new(certificate_pem: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
        Self {
            certificate_pem: certificate_pem.into(),
            private_key_pem: private_key_pem.into(),
            trusted_authorities_pem: None,
            server_name: None,
        }
    }

    /// Set the trusted authorities.
    pub fn trusted_authorities(mut self, pem: impl Into<String>) -> Self {
        self.trusted_authorities_pem = Some(pem.into());
        self
    }

    /// Set the server name checked when acting as TLS client.
    pub fn server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }
}

impl std::fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSettings")
            .field("certificate_pem", &format!("{} bytes", self.certificate_pem.len()))
            .field("private_key_pem", &"<redacted>")
            .field(
                "trusted_authorities_pem",
                &self.trusted_authorities_pem.as_ref().map(|p| p.len()),
            )
            .field("server_name", &self.server_name)
            .finish()
    }
}
