//! Unified error type for the Handoff framework.

use handoff_protocol::ProtocolError;
use handoff_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// Hand-off itself never fails from the caller's point of view (timeouts
/// and broker outages degrade instead of erroring), so this mostly shows
/// up at startup and on reload. The `#[from]` attributes let `?` convert
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    /// A transport-level error (connect, publish, subscribe).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (malformed payload).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A configuration error (unreadable, unparsable, or invalid).
    #[error(transparent)]
    Config(#[from] ConfigError),
}
