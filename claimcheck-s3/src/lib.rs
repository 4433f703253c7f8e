//! # claimcheck-s3
//!
//! Claim check backend for S3-compatible object stores (AWS S3, MinIO,
//! RustFS). Each topic maps to one bucket; each checked-in payload is one
//! object named by a UUID.
//!
//! ```rust,no_run
//! use claimcheck_core::prelude::*;
//!
//! let mut registry = BackendRegistry::new();
//! claimcheck_s3::register(&mut registry);
//!
//! let config = ClaimCheckConfig::new()
//!     .with_backend(BackendKind::S3)
//!     .create_container_if_missing()
//!     .with_option(claimcheck_s3::keys::ENDPOINT, "http://localhost:9000")
//!     .with_option(claimcheck_s3::keys::ACCESS_KEY_ID, "minioadmin")
//!     .with_option(claimcheck_s3::keys::SECRET_ACCESS_KEY_FROM, "env:S3_SECRET");
//!
//! let backend = registry.create(&config).unwrap();
//! ```
//!
//! The SDK is async; the backend owns a small Tokio runtime and blocks on
//! it, so it must not be called from inside another Tokio runtime.

pub mod backend;
pub mod config;

pub use backend::S3Backend;
pub use config::{keys, S3Credentials, S3Settings, SecretSource};

use claimcheck_core::{BackendKind, BackendRegistry};

/// Make `claimcheck.backend = s3` available in `registry`
pub fn register(registry: &mut BackendRegistry) -> &mut BackendRegistry {
    registry.register_configurable::<S3Backend>(BackendKind::S3)
}
