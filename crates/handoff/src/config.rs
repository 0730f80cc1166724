//! Proxy configuration and its TOML loader.
//!
//! Everything the hand-off gate needs to know at startup lives in one
//! [`HandoffConfig`]. Missing keys fall back to defaults, so an empty file
//! (or no file at all) gives a proxy with the transport disabled and the
//! gate in pass-through mode.
//!
//! ```toml
//! ack_timeout_ms = 2000
//!
//! [transport]
//! enabled = true
//! host = "cache.internal"
//! port = 6379
//! password = "hunter2"
//! use_ssl = false
//!
//! [channels]
//! save_request = "handoff:save-request"
//! save_ack = "handoff:save-ack"
//! broadcast = "handoff:broadcast"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use handoff_protocol::{BROADCAST_CHANNEL, SAVE_ACK_CHANNEL, SAVE_REQUEST_CHANNEL};
use handoff_transport::TransportConfig;
use serde::Deserialize;

/// How long the gate holds a switch waiting for the source server's save.
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 2_000;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config text is not valid TOML for [`HandoffConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but a value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// ChannelConfig
// ---------------------------------------------------------------------------

/// Names of the pub/sub channels shared with the backend servers.
///
/// Every process in a deployment must agree on these.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub save_request: String,
    pub save_ack: String,
    pub broadcast: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            save_request: SAVE_REQUEST_CHANNEL.to_string(),
            save_ack: SAVE_ACK_CHANNEL.to_string(),
            broadcast: BROADCAST_CHANNEL.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// HandoffConfig
// ---------------------------------------------------------------------------

/// Complete configuration for a hand-off proxy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Broker connection settings.
    pub transport: TransportConfig,

    /// Channel names.
    pub channels: ChannelConfig,

    /// Upper bound on waiting for a save acknowledgement, in milliseconds.
    /// When it elapses the switch goes ahead anyway.
    pub ack_timeout_ms: u64,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            channels: ChannelConfig::default(),
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
        }
    }
}

impl HandoffConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            transport_enabled = config.transport.enabled,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Rejects values the gate cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ack_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "ack_timeout_ms must not be 0".into(),
            ));
        }
        self.transport
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let ChannelConfig {
            save_request,
            save_ack,
            broadcast,
        } = &self.channels;
        for (key, name) in [
            ("save_request", save_request),
            ("save_ack", save_ack),
            ("broadcast", broadcast),
        ] {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "channels.{key} must not be empty"
                )));
            }
        }
        if save_request == save_ack
            || save_request == broadcast
            || save_ack == broadcast
        {
            return Err(ConfigError::Invalid(
                "channel names must be distinct".into(),
            ));
        }
        Ok(())
    }

    /// The acknowledgement timeout as a [`Duration`].
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}
