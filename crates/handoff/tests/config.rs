//! Integration tests for loading configuration from disk.

use std::io::Write;

use handoff::{ConfigError, HandoffConfig};

#[test]
fn test_load_reads_toml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        ack_timeout_ms = 3000

        [transport]
        enabled = true
        host = "redis.internal"
        port = 6390
        "#
    )
    .unwrap();

    let config = HandoffConfig::load(file.path()).unwrap();

    assert_eq!(config.ack_timeout_ms, 3000);
    assert!(config.transport.enabled);
    assert_eq!(config.transport.host, "redis.internal");
    assert_eq!(config.transport.port, 6390);
    assert!(config.transport.password.is_empty());
}

#[test]
fn test_load_missing_file_is_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = HandoffConfig::load(&path).unwrap_err();

    match err {
        ConfigError::Read { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected read error, got {other:?}"),
    }
}

#[test]
fn test_load_invalid_values_are_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[transport]\nenabled = true\nport = 0").unwrap();

    let err = HandoffConfig::load(file.path()).unwrap_err();

    assert!(matches!(err, ConfigError::Invalid(_)));
}
