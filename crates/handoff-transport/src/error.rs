use std::time::Duration;

/// Errors that can occur in the transport layer.
///
/// Only [`connect`](crate::RedisPubSub::connect) returns these to callers.
/// Once a handle exists, publish and subscribe failures are logged and
/// swallowed so hand-off logic never branches on network health.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport is turned off in configuration.
    #[error("transport disabled by configuration")]
    Disabled,

    /// The configuration cannot describe a reachable backend.
    #[error("invalid transport config: {0}")]
    InvalidConfig(String),

    /// Establishing the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Establishing the connection took longer than allowed.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Publishing a message failed.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Subscribing to a channel failed.
    #[error("subscribe failed: {0}")]
    Subscribe(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_failure() {
        let cases = [
            (TransportError::Disabled, "transport disabled by configuration"),
            (
                TransportError::InvalidConfig("port must not be 0".into()),
                "invalid transport config: port must not be 0",
            ),
            (TransportError::Connect("refused".into()), "connect failed: refused"),
            (
                TransportError::ConnectTimeout(Duration::from_secs(5)),
                "connect timed out after 5s",
            ),
            (TransportError::Publish("broken pipe".into()), "publish failed: broken pipe"),
            (TransportError::Subscribe("closed".into()), "subscribe failed: closed"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }
}
