//! Building the S3 backend through the registry; nothing here reaches the network.

use claimcheck_core::prelude::*;
use claimcheck_core::ConfigurableBackend;
use claimcheck_s3::keys;

fn config() -> ClaimCheckConfig {
    ClaimCheckConfig::new()
        .with_backend(BackendKind::S3)
        .create_container_if_missing()
        .with_option(keys::ENDPOINT, "http://127.0.0.1:9")
        .with_option(keys::ACCESS_KEY_ID, "test")
        .with_option(keys::SECRET_ACCESS_KEY_FROM, "value:test")
        .with_option(keys::BUCKET_PREFIX, "claims-")
}

/// R1. The s3 kind is only available after registration
#[test_log::test]
fn test_register_adds_s3_kind() {
    // Arrange
    let mut registry = BackendRegistry::new();
    assert!(!registry.is_registered(BackendKind::S3));

    // Act
    claimcheck_s3::register(&mut registry);
    let backend = registry.create(&config()).unwrap();

    // Assert
    assert!(registry.is_registered(BackendKind::S3));
    assert_eq!(backend.name(), "s3");
    backend.close();
    backend.close();
}

/// R2. Foreign or malformed references are rejected before any request
#[test_log::test]
fn test_bad_references() {
    let backend = claimcheck_s3::S3Backend::configure(&config()).unwrap();

    for reference in ["memory://topic/abc", "s3://bucket", "s3:///key", "s3://bucket/a/b"] {
        let err = backend.check_out(&ClaimCheck::new(reference)).unwrap_err();

        assert!(err.is_bad_reference(), "{reference}");
        assert_eq!(err.kind(), ErrorKind::BackendFailure);
    }
}

/// R3. Invalid settings fail at configuration time
#[test]
fn test_invalid_settings_fail_configure() {
    let mut registry = BackendRegistry::new();
    claimcheck_s3::register(&mut registry);
    let config = ClaimCheckConfig::new()
        .with_backend(BackendKind::S3)
        .with_option(keys::CREDENTIALS, "default")
        .with_option(keys::ACCESS_KEY_ID, "test");

    let err = registry.create(&config).err().unwrap();

    assert_eq!(err.kind(), ErrorKind::ConfigFailure);
}

/// R4. Topics map to prefixed bucket names, folded ones made unique
#[test]
fn test_bucket_per_topic() {
    let backend = claimcheck_s3::S3Backend::configure(&config()).unwrap();
    let settings = backend.settings();

    assert_eq!(settings.bucket_for("orders-v2"), "claims-orders-v2");
    assert!(settings.bucket_for("Orders_v2").starts_with("claims-orders-v2-"));
    assert_ne!(settings.bucket_for("orders.v2"), settings.bucket_for("orders_v2"));
    assert!(settings.force_path_style);
}
