use std::fmt;

use crate::headers::{HEADER_MESSAGE_CLAIM_CHECK, HEADER_MESSAGE_CLAIM_CHECK_ERROR};
use crate::{ClaimCheckError, ClaimCheckResult, Headers};

/// Opaque reference to an externalized payload.
///
/// Only the backend that issued it knows how to interpret the string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimCheck {
    reference: String,
}

impl ClaimCheck {
    pub fn new<S: Into<String>>(reference: S) -> Self {
        Self {
            reference: reference.into(),
        }
    }

    /// Decode a reference header value
    pub fn from_bytes(bytes: &[u8]) -> ClaimCheckResult<Self> {
        let reference = std::str::from_utf8(bytes)
            .map_err(|e| ClaimCheckError::contract(format!("claim check reference is not UTF-8: {e}")))?;
        Ok(Self::new(reference))
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Header encoding of this reference
    pub fn to_bytes(&self) -> Vec<u8> {
        self.reference.as_bytes().to_vec()
    }
}

impl fmt::Display for ClaimCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference)
    }
}

/// What the producer interceptor did with a record, as seen by later stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimCheckOutcome {
    /// Small or null value, sent as is
    Passthrough,
    /// Value stored in the backend under this reference
    Externalized(ClaimCheck),
    /// Check-in was attempted and failed; the description is surfaced by the serializer
    Failed(String),
}

impl ClaimCheckOutcome {
    /// Read the outcome from a record's headers. An error header takes
    /// precedence over a reference header.
    pub fn from_headers(headers: &Headers) -> ClaimCheckResult<Self> {
        if let Some(description) = headers.first(HEADER_MESSAGE_CLAIM_CHECK_ERROR) {
            return Ok(Self::Failed(String::from_utf8_lossy(description).into_owned()));
        }

        match headers.first(HEADER_MESSAGE_CLAIM_CHECK) {
            Some(reference) => Ok(Self::Externalized(ClaimCheck::from_bytes(reference)?)),
            None => Ok(Self::Passthrough),
        }
    }

    /// Write the outcome into a header set
    pub fn apply(&self, mut headers: Headers) -> Headers {
        match self {
            Self::Passthrough => {}
            Self::Externalized(claim_check) => {
                headers.add(HEADER_MESSAGE_CLAIM_CHECK, claim_check.to_bytes());
            }
            Self::Failed(description) => {
                headers.add(HEADER_MESSAGE_CLAIM_CHECK_ERROR, description.as_bytes().to_vec());
            }
        }
        headers
    }

    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::Passthrough)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_outcome_header_encoding() {
        let externalized = ClaimCheckOutcome::Externalized(ClaimCheck::new("memory://t/1"));
        let headers = externalized.apply(Headers::new().with("other", "x"));

        assert_eq!(headers.first(HEADER_MESSAGE_CLAIM_CHECK), Some(&b"memory://t/1"[..]));
        assert_eq!(ClaimCheckOutcome::from_headers(&headers).unwrap(), externalized);
    }

    #[test]
    fn test_passthrough_adds_nothing() {
        let headers = ClaimCheckOutcome::Passthrough.apply(Headers::new());

        assert!(headers.is_empty());
        assert!(ClaimCheckOutcome::from_headers(&headers).unwrap().is_passthrough());
    }

    #[test]
    fn test_error_header_wins() {
        let headers = Headers::new()
            .with(HEADER_MESSAGE_CLAIM_CHECK, "ref")
            .with(HEADER_MESSAGE_CLAIM_CHECK_ERROR, "failed");

        assert_eq!(
            ClaimCheckOutcome::from_headers(&headers).unwrap(),
            ClaimCheckOutcome::Failed("failed".to_string())
        );
    }

    #[test]
    fn test_non_utf8_reference_is_contract_violation() {
        let headers = Headers::new().with(HEADER_MESSAGE_CLAIM_CHECK, vec![0xff, 0xfe]);
        let err = ClaimCheckOutcome::from_headers(&headers).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ContractViolation);
    }
}
