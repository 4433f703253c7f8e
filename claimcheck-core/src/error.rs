use thiserror::Error;

/// Result type for claim check operations
pub type ClaimCheckResult<T> = Result<T, ClaimCheckError>;

/// Coarse classification used by callers deciding how to react to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or incompatible configuration, raised at setup
    ConfigFailure,
    /// I/O or protocol failure talking to the storage backend
    BackendFailure,
    /// The caller broke a usage contract (missing header, malformed data)
    ContractViolation,
    /// A wrapped key/value codec failed
    Codec,
}

/// Errors raised by interceptors, codecs and backends
#[derive(Error, Debug)]
pub enum ClaimCheckError {
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Claim check backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Bad claim check reference: {reference}")]
    BadReference { reference: String },

    #[error("Contract violation: {message}")]
    ContractViolation { message: String },

    /// Raised by the value serializer when the interceptor left an error header behind
    #[error("Claim check interceptor error:\n{description}")]
    Externalization { description: String },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl ClaimCheckError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a backend error without an underlying cause
    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Create a backend error wrapping the store's own error
    pub fn backend_source<S, E>(message: S, error: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Create a bad reference error
    pub fn bad_reference<S: Into<String>>(reference: S) -> Self {
        Self::BadReference {
            reference: reference.into(),
        }
    }

    /// Create a contract violation error
    pub fn contract<S: Into<String>>(message: S) -> Self {
        Self::ContractViolation {
            message: message.into(),
        }
    }

    /// Create a serialization error from a codec failure
    pub fn serialization<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Serialization {
            message: error.to_string(),
            source: Some(Box::new(error)),
        }
    }

    /// Create a serialization error from a message
    pub fn serialization_msg<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
            source: None,
        }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::ConfigFailure,
            Self::Backend { .. }
            | Self::BadReference { .. }
            | Self::Externalization { .. }
            | Self::Io { .. } => ErrorKind::BackendFailure,
            Self::ContractViolation { .. } => ErrorKind::ContractViolation,
            Self::Serialization { .. } => ErrorKind::Codec,
        }
    }

    /// Whether the backend could not parse or resolve a reference
    pub fn is_bad_reference(&self) -> bool {
        matches!(self, Self::BadReference { .. })
    }
}

impl From<serde_json::Error> for ClaimCheckError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kinds() {
        assert_eq!(ClaimCheckError::config("x").kind(), ErrorKind::ConfigFailure);
        assert_eq!(ClaimCheckError::backend("x").kind(), ErrorKind::BackendFailure);
        assert_eq!(
            ClaimCheckError::bad_reference("nope").kind(),
            ErrorKind::BackendFailure
        );
        assert_eq!(
            ClaimCheckError::contract("x").kind(),
            ErrorKind::ContractViolation
        );
        assert!(ClaimCheckError::bad_reference("nope").is_bad_reference());
    }

    #[test]
    fn test_backend_source_is_chained() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let err = ClaimCheckError::backend_source("upload failed", io);

        assert_eq!(err.to_string(), "Claim check backend error: upload failed");
        let source = err.source().map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk on fire"));
    }

    #[test]
    fn test_externalization_display_carries_description() {
        let err = ClaimCheckError::Externalization {
            description: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Claim check interceptor error:\nboom");
    }
}
