//! Broker connection settings.

use std::time::Duration;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;

use crate::TransportError;

/// Where and how to reach the pub/sub broker.
///
/// Read once at startup. A configuration reload builds a new
/// `TransportConfig` and a new transport; nothing here changes at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Master switch. `false` disables the transport entirely and turns
    /// the hand-off gate into a pass-through.
    pub enabled: bool,

    /// Broker host name or address.
    pub host: String,

    /// Broker TCP port.
    pub port: u16,

    /// Broker password. Empty means no `AUTH`.
    pub password: String,

    /// Connect with TLS (`rediss://`). Requires the `tls` feature.
    #[serde(alias = "useSsl")]
    pub use_ssl: bool,

    /// Upper bound on establishing the initial connection.
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            use_ssl: false,
            connect_timeout_ms: 5_000,
        }
    }
}

impl TransportConfig {
    /// Checks that an enabled config names a reachable endpoint.
    ///
    /// A disabled config is always valid.
    pub fn validate(&self) -> Result<(), TransportError> {
        if !self.enabled {
            return Ok(());
        }
        if self.host.trim().is_empty() {
            return Err(TransportError::InvalidConfig(
                "host must not be empty".into(),
            ));
        }
        if self.port == 0 {
            return Err(TransportError::InvalidConfig(
                "port must not be 0".into(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(TransportError::InvalidConfig(
                "connect_timeout_ms must not be 0".into(),
            ));
        }
        Ok(())
    }

    /// Connection timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Builds the broker URL, e.g. `rediss://:secret@cache.internal:6380/`.
    ///
    /// The password is percent-encoded so characters like `@` or `/`
    /// survive URL parsing.
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "rediss" } else { "redis" };
        let auth = if self.password.is_empty() {
            String::new()
        } else {
            format!(":{}@", utf8_percent_encode(&self.password, USERINFO))
        };
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!("{scheme}://{auth}{host}:{}/", self.port)
    }
}

/// Everything outside the RFC 3986 unreserved set.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
