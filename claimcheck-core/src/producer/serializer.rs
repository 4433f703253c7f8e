use std::sync::Arc;

use crate::codec::{CodecRegistry, Serializer};
use crate::config::{keys, ClaimCheckConfig};
use crate::{ClaimCheckError, ClaimCheckOutcome, ClaimCheckResult, Headers};

/// Codec id of [`ClaimCheckSerializer`] in `value.serializer`
pub const CLAIM_CHECK_SERIALIZER: &str = "claimcheck";

/// Value serializer completing the producer handshake.
///
/// Raises the failure the interceptor recorded in the error header, emits
/// an empty value for checked-in records and otherwise delegates to the
/// wrapped serializer. Only meant for values, never keys.
pub struct ClaimCheckSerializer<T> {
    wrapped: Arc<dyn Serializer<T>>,
}

impl<T> ClaimCheckSerializer<T> {
    pub fn new(wrapped: Arc<dyn Serializer<T>>) -> Self {
        Self { wrapped }
    }

    /// Wrap the serializer named by `value.serializer.wrapped.serializer`
    pub fn configure(config: &ClaimCheckConfig, value_codecs: &CodecRegistry<T>) -> ClaimCheckResult<Self> {
        let id = ClaimCheckConfig::require_codec(&config.wrapped_value_serializer, keys::WRAPPED_VALUE_SERIALIZER)?;
        if id == CLAIM_CHECK_SERIALIZER {
            return Err(ClaimCheckError::config(format!(
                "{} must name the serializer to wrap, not {CLAIM_CHECK_SERIALIZER}",
                keys::WRAPPED_VALUE_SERIALIZER
            )));
        }
        Ok(Self::new(value_codecs.serializer(id)?))
    }
}

impl<T> Serializer<T> for ClaimCheckSerializer<T> {
    fn codec_id(&self) -> &'static str {
        CLAIM_CHECK_SERIALIZER
    }

    fn serialize(&self, topic: &str, headers: &Headers, data: Option<&T>) -> ClaimCheckResult<Option<Vec<u8>>> {
        match ClaimCheckOutcome::from_headers(headers)? {
            ClaimCheckOutcome::Failed(description) => Err(ClaimCheckError::Externalization { description }),
            // non-null so the broker does not read it as a tombstone
            ClaimCheckOutcome::Externalized(_) => Ok(Some(Vec::new())),
            ClaimCheckOutcome::Passthrough => self.wrapped.serialize(topic, headers, data),
        }
    }

    fn close(&self) {
        self.wrapped.close();
    }
}
