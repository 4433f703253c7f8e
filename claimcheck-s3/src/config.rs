//! S3 backend settings, read from the `claimcheck.s3.*` keys.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use claimcheck_core::{ClaimCheckConfig, ClaimCheckError, ClaimCheckResult, ConfigMap};
use uuid::Uuid;

pub mod keys {
    pub const ENDPOINT: &str = "claimcheck.s3.endpoint";
    pub const REGION: &str = "claimcheck.s3.region";
    pub const BUCKET_PREFIX: &str = "claimcheck.s3.bucket-prefix";
    pub const FORCE_PATH_STYLE: &str = "claimcheck.s3.force-path-style";
    pub const CREDENTIALS: &str = "claimcheck.s3.credentials";
    pub const ACCESS_KEY_ID: &str = "claimcheck.s3.access-key-id";
    pub const SECRET_ACCESS_KEY_FROM: &str = "claimcheck.s3.secret-access-key.from";
    pub const PART_SIZE: &str = "claimcheck.s3.multipart.part-size.bytes";
}

pub const DEFAULT_REGION: &str = "us-east-1";

/// Streams up to this size go up in a single request
pub const DEFAULT_PART_SIZE: u64 = 8 * 1024 * 1024;

/// Smallest part S3 accepts for anything but the last part
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Largest part or single upload S3 accepts
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Where a secret comes from: `value:<secret>`, `env:<VAR>` or `path:<file>`
#[derive(Clone, PartialEq, Eq)]
pub enum SecretSource {
    Value(String),
    Env(String),
    Path(PathBuf),
}

impl SecretSource {
    /// Read the secret now
    pub fn resolve(&self) -> ClaimCheckResult<String> {
        match self {
            Self::Value(secret) => Ok(secret.clone()),
            Self::Env(var) => std::env::var(var)
                .map_err(|_| ClaimCheckError::config(format!("{var} environment variable required"))),
            Self::Path(path) => std::fs::read_to_string(path)
                .map(|secret| secret.trim().to_string())
                .map_err(|e| ClaimCheckError::config(format!("could not read secret from {}: {e}", path.display()))),
        }
    }
}

impl FromStr for SecretSource {
    type Err = ClaimCheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = match s.split_once(':') {
            Some(("value", secret)) if !secret.is_empty() => Self::Value(secret.to_string()),
            Some(("env", var)) if !var.is_empty() => Self::Env(var.to_string()),
            Some(("path", path)) if !path.is_empty() => Self::Path(PathBuf::from(path)),
            _ => {
                return Err(ClaimCheckError::config(format!(
                    "Invalid value for configuration {}: expected value:<secret>, env:<VAR> or path:<file>",
                    keys::SECRET_ACCESS_KEY_FROM
                )))
            }
        };
        Ok(parsed)
    }
}

// never print the secret itself
impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value(***)"),
            Self::Env(var) => f.debug_tuple("Env").field(var).finish(),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
        }
    }
}

/// How the client authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S3Credentials {
    /// The SDK's default provider chain
    Default,
    Static {
        access_key_id: String,
        secret_access_key: SecretSource,
    },
}

impl S3Credentials {
    /// Exactly one source must be configured
    fn from_options(options: &ConfigMap) -> ClaimCheckResult<Self> {
        let default_chain = match options.get(keys::CREDENTIALS) {
            None => false,
            Some("default") => true,
            Some(other) => {
                return Err(ClaimCheckError::config(format!(
                    "Invalid value {other} for configuration {}: expected default",
                    keys::CREDENTIALS
                )))
            }
        };
        let access_key_id = options.get(keys::ACCESS_KEY_ID);
        let secret = options.get(keys::SECRET_ACCESS_KEY_FROM);

        match (default_chain, access_key_id, secret) {
            (true, None, None) => Ok(Self::Default),
            (false, Some(access_key_id), Some(secret)) => Ok(Self::Static {
                access_key_id: access_key_id.to_string(),
                secret_access_key: secret.parse()?,
            }),
            _ => {
                let found: Vec<&str> = [keys::CREDENTIALS, keys::ACCESS_KEY_ID, keys::SECRET_ACCESS_KEY_FROM]
                    .into_iter()
                    .filter(|key| options.has(key))
                    .collect();
                Err(ClaimCheckError::config(format!(
                    "Exactly one credential source is required: either {} = default, or {} with {}; found [{}]",
                    keys::CREDENTIALS,
                    keys::ACCESS_KEY_ID,
                    keys::SECRET_ACCESS_KEY_FROM,
                    found.join(", ")
                )))
            }
        }
    }
}

/// Validated S3 backend settings
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket_prefix: String,
    pub force_path_style: bool,
    pub credentials: S3Credentials,
    pub part_size: u64,
    pub create_bucket_if_missing: bool,
}

impl S3Settings {
    pub fn from_config(config: &ClaimCheckConfig) -> ClaimCheckResult<Self> {
        let options = &config.options;

        let endpoint = options.get(keys::ENDPOINT).map(str::to_string);
        if let Some(endpoint) = &endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ClaimCheckError::config(format!(
                    "Invalid value {endpoint} for configuration {}: expected an http or https URL",
                    keys::ENDPOINT
                )));
            }
        }

        let part_size = options.get_u64(keys::PART_SIZE)?.unwrap_or(DEFAULT_PART_SIZE);
        if !(MIN_PART_SIZE..=MAX_PART_SIZE).contains(&part_size) {
            return Err(ClaimCheckError::config(format!(
                "Invalid value {part_size} for configuration {}: must be between {MIN_PART_SIZE} and {MAX_PART_SIZE}",
                keys::PART_SIZE
            )));
        }

        Ok(Self {
            force_path_style: options.get_bool(keys::FORCE_PATH_STYLE)?.unwrap_or(endpoint.is_some()),
            endpoint,
            region: options.get(keys::REGION).unwrap_or(DEFAULT_REGION).to_string(),
            bucket_prefix: options.get(keys::BUCKET_PREFIX).unwrap_or_default().to_string(),
            credentials: S3Credentials::from_options(options)?,
            part_size,
            create_bucket_if_missing: config.create_container_if_missing,
        })
    }

    /// Bucket holding the payloads of `topic`
    pub fn bucket_for(&self, topic: &str) -> String {
        bucket_name(&self.bucket_prefix, topic)
    }
}

/// Hex digits of the name hash appended to folded bucket names
const SUFFIX_LEN: usize = 8;

/// `<prefix><topic>` as an S3 bucket name: lowercase letters, digits and
/// hyphens, 3 to 63 characters, alphanumeric at both ends.
///
/// Names already valid are used as is. Anything else is folded into that
/// alphabet, cut to length and suffixed with a hash of the unfolded name,
/// so distinct topics never share a bucket.
pub fn bucket_name(prefix: &str, topic: &str) -> String {
    let raw = format!("{prefix}{topic}");
    let mut folded = String::with_capacity(raw.len());
    for c in raw.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' };
        // collapse runs of separators
        if !(c == '-' && folded.ends_with('-')) {
            folded.push(c);
        }
    }
    let folded = folded.trim_matches('-');

    if folded == raw && (3..=63).contains(&folded.len()) {
        return raw;
    }

    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.as_bytes()).simple().to_string();
    let suffix = &digest[..SUFFIX_LEN];
    let base = folded[..folded.len().min(63 - SUFFIX_LEN - 1)].trim_end_matches('-');
    if base.is_empty() {
        suffix.to_string()
    } else {
        format!("{base}-{suffix}")
    }
}
