//! # Claim check configuration
//!
//! Settings arrive as a flat string key/value store, the same shape a
//! pub/sub client's property map has. [`ConfigMap`] holds the raw values;
//! [`ClaimCheckConfig`] is the validated, typed view the interceptors,
//! codecs and backends are built from.
//!
//! ```rust
//! use claimcheck_core::config::{ConfigMap, ClaimCheckConfig, keys};
//!
//! let mut map = ConfigMap::new();
//! map.set(keys::BACKEND, "memory");
//! map.set(keys::VALUE_SERIALIZER, "claimcheck");
//! map.set(keys::WRAPPED_VALUE_SERIALIZER, "string");
//!
//! let config = ClaimCheckConfig::from_map(map).unwrap();
//! assert_eq!(config.threshold_bytes, 1048576 - 512);
//! ```
//!
//! ## Environment overrides
//! [`ConfigMap::load_env`] maps `PREFIX__CLAIMCHECK__BACKEND=memory`
//! to `claimcheck.backend = memory`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::{ClaimCheckError, ClaimCheckResult};

/// Configuration key names
pub mod keys {
    pub const CHECKIN_SIZE_OVER_BYTES: &str = "claimcheck.checkin.uncompressed-batch-size.over.bytes";
    pub const BACKEND: &str = "claimcheck.backend";
    pub const CREATE_CONTAINER_IF_MISSING: &str = "claimcheck.backend.create-container-if-missing";
    pub const KEY_SERIALIZER: &str = "key.serializer";
    pub const VALUE_SERIALIZER: &str = "value.serializer";
    pub const WRAPPED_VALUE_SERIALIZER: &str = "value.serializer.wrapped.serializer";
    pub const KEY_DESERIALIZER: &str = "key.deserializer";
    pub const VALUE_DESERIALIZER: &str = "value.deserializer";
    pub const WRAPPED_VALUE_DESERIALIZER: &str = "value.deserializer.wrapped.deserializer";
    pub const FILESYSTEM_ROOT: &str = "claimcheck.filesystem.root";
}

/// Default threshold: 1 MiB minus a margin for batch framing
pub const DEFAULT_CHECKIN_SIZE_OVER_BYTES: u64 = 1048576 - 512;

/// Raw string key/value settings
#[derive(Debug, Clone, Default)]
pub struct ConfigMap {
    values: HashMap<String, String>,
}

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value that must be present
    pub fn require(&self, key: &str) -> ClaimCheckResult<&str> {
        self.get(key)
            .ok_or_else(|| ClaimCheckError::config(format!("Missing required configuration \"{key}\"")))
    }

    pub fn get_u64(&self, key: &str) -> ClaimCheckResult<Option<u64>> {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| {
                    ClaimCheckError::config(format!("Invalid value {raw} for configuration {key}: expected an unsigned integer"))
                })
            })
            .transpose()
    }

    pub fn get_bool(&self, key: &str) -> ClaimCheckResult<Option<bool>> {
        self.get(key)
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ClaimCheckError::config(format!(
                    "Invalid value {raw} for configuration {key}: expected true or false"
                ))),
            })
            .transpose()
    }

    /// Import `PREFIX__A__B=value` environment variables as `a.b = value`
    pub fn load_env(&mut self, prefix: &str) -> &mut Self {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        self.load_vars(prefix, vars)
    }

    fn load_vars<I>(&mut self, prefix: &str, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped
                    .trim_start_matches("__")
                    .to_lowercase()
                    .replace("__", ".");
                if !normalized.is_empty() {
                    self.values.insert(normalized, value);
                }
            }
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.set(key, value);
        }
        map
    }
}

/// Which storage backend implementation to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Memory,
    FileSystem,
    S3,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::FileSystem => "filesystem",
            Self::S3 => "s3",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ClaimCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "filesystem" | "fs" => Ok(Self::FileSystem),
            "s3" => Ok(Self::S3),
            other => Err(ClaimCheckError::config(format!(
                "Unknown claim check backend \"{other}\", expected one of memory, filesystem, s3"
            ))),
        }
    }
}

/// Validated claim check settings
#[derive(Debug, Clone)]
pub struct ClaimCheckConfig {
    /// Records whose estimated batch size exceeds this are checked in
    pub threshold_bytes: u64,

    pub backend: Option<BackendKind>,

    /// Create the per-topic container on first use instead of failing
    pub create_container_if_missing: bool,

    pub key_serializer: Option<String>,
    pub value_serializer: Option<String>,
    pub wrapped_value_serializer: Option<String>,
    pub key_deserializer: Option<String>,
    pub value_deserializer: Option<String>,
    pub wrapped_value_deserializer: Option<String>,

    /// Every raw setting, for backend-specific parameters
    pub options: ConfigMap,
}

impl Default for ClaimCheckConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: DEFAULT_CHECKIN_SIZE_OVER_BYTES,
            backend: None,
            create_container_if_missing: false,
            key_serializer: None,
            value_serializer: None,
            wrapped_value_serializer: None,
            key_deserializer: None,
            value_deserializer: None,
            wrapped_value_deserializer: None,
            options: ConfigMap::new(),
        }
    }
}

impl ClaimCheckConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a raw map
    pub fn from_map(options: ConfigMap) -> ClaimCheckResult<Self> {
        let threshold_bytes = options
            .get_u64(keys::CHECKIN_SIZE_OVER_BYTES)?
            .unwrap_or(DEFAULT_CHECKIN_SIZE_OVER_BYTES);
        let backend = options.get(keys::BACKEND).map(str::parse).transpose()?;
        let create_container_if_missing = options
            .get_bool(keys::CREATE_CONTAINER_IF_MISSING)?
            .unwrap_or(false);
        let owned = |key: &str| options.get(key).map(str::to_string);

        Ok(Self {
            threshold_bytes,
            backend,
            create_container_if_missing,
            key_serializer: owned(keys::KEY_SERIALIZER),
            value_serializer: owned(keys::VALUE_SERIALIZER),
            wrapped_value_serializer: owned(keys::WRAPPED_VALUE_SERIALIZER),
            key_deserializer: owned(keys::KEY_DESERIALIZER),
            value_deserializer: owned(keys::VALUE_DESERIALIZER),
            wrapped_value_deserializer: owned(keys::WRAPPED_VALUE_DESERIALIZER),
            options,
        })
    }

    pub fn with_threshold(mut self, bytes: u64) -> Self {
        self.threshold_bytes = bytes;
        self
    }

    pub fn with_backend(mut self, kind: BackendKind) -> Self {
        self.backend = Some(kind);
        self
    }

    pub fn create_container_if_missing(mut self) -> Self {
        self.create_container_if_missing = true;
        self
    }

    pub fn with_key_serializer<S: Into<String>>(mut self, id: S) -> Self {
        self.key_serializer = Some(id.into());
        self
    }

    pub fn with_value_serializer<S: Into<String>>(mut self, id: S) -> Self {
        self.value_serializer = Some(id.into());
        self
    }

    pub fn with_wrapped_value_serializer<S: Into<String>>(mut self, id: S) -> Self {
        self.wrapped_value_serializer = Some(id.into());
        self
    }

    pub fn with_key_deserializer<S: Into<String>>(mut self, id: S) -> Self {
        self.key_deserializer = Some(id.into());
        self
    }

    pub fn with_value_deserializer<S: Into<String>>(mut self, id: S) -> Self {
        self.value_deserializer = Some(id.into());
        self
    }

    pub fn with_wrapped_value_deserializer<S: Into<String>>(mut self, id: S) -> Self {
        self.wrapped_value_deserializer = Some(id.into());
        self
    }

    /// Set a backend-specific option
    pub fn with_option<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.options.set(key, value);
        self
    }

    pub fn require_backend(&self) -> ClaimCheckResult<BackendKind> {
        self.backend
            .ok_or_else(|| ClaimCheckError::config(format!("Missing required configuration \"{}\"", keys::BACKEND)))
    }

    pub(crate) fn require_codec<'a>(value: &'a Option<String>, key: &str) -> ClaimCheckResult<&'a str> {
        value
            .as_deref()
            .ok_or_else(|| ClaimCheckError::config(format!("Missing required configuration \"{key}\"")))
    }
}
