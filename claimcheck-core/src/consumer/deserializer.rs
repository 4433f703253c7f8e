use std::sync::Arc;

use tracing::trace;

use crate::backend::{BackendRegistry, ClaimCheckBackend};
use crate::codec::{CodecRegistry, Deserializer};
use crate::config::{keys, ClaimCheckConfig};
use crate::{ClaimCheckError, ClaimCheckOutcome, ClaimCheckResult, Headers, PayloadStream};

/// Codec id of the claim check deserializers in `value.deserializer`
pub const CLAIM_CHECK_DESERIALIZER: &str = "claimcheck";

/// Value deserializer that checks out externalized values before
/// handing the bytes to the wrapped deserializer
pub struct ClaimCheckDeserializer<T> {
    wrapped: Arc<dyn Deserializer<T>>,
    backend: Arc<dyn ClaimCheckBackend>,
}

impl<T> ClaimCheckDeserializer<T> {
    pub fn new(backend: Arc<dyn ClaimCheckBackend>, wrapped: Arc<dyn Deserializer<T>>) -> Self {
        Self { wrapped, backend }
    }

    /// Wrap the deserializer named by `value.deserializer.wrapped.deserializer`
    pub fn configure(
        config: &ClaimCheckConfig,
        value_codecs: &CodecRegistry<T>,
        backends: &BackendRegistry,
    ) -> ClaimCheckResult<Self> {
        let id = ClaimCheckConfig::require_codec(&config.wrapped_value_deserializer, keys::WRAPPED_VALUE_DESERIALIZER)?;
        Ok(Self::new(backends.create(config)?, value_codecs.deserializer(id)?))
    }
}

impl<T> Deserializer<T> for ClaimCheckDeserializer<T> {
    fn codec_id(&self) -> &'static str {
        CLAIM_CHECK_DESERIALIZER
    }

    fn deserialize(&self, topic: &str, headers: &Headers, data: Option<&[u8]>) -> ClaimCheckResult<Option<T>> {
        match ClaimCheckOutcome::from_headers(headers)? {
            ClaimCheckOutcome::Failed(description) => Err(ClaimCheckError::Externalization { description }),
            ClaimCheckOutcome::Externalized(claim_check) => {
                trace!("received claim check: topic={}, ref={}", topic, claim_check);
                let payload = self.backend.check_out(&claim_check)?;
                self.wrapped.deserialize(topic, headers, Some(payload.as_slice()))
            }
            ClaimCheckOutcome::Passthrough => self.wrapped.deserialize(topic, headers, data),
        }
    }

    fn close(&self) {
        self.wrapped.close();
        self.backend.close();
    }
}

/// Value deserializer for streaming mode, yielding the payload as a stream
pub struct ClaimCheckStreamingDeserializer {
    backend: Arc<dyn ClaimCheckBackend>,
}

impl ClaimCheckStreamingDeserializer {
    pub fn new(backend: Arc<dyn ClaimCheckBackend>) -> Self {
        Self { backend }
    }

    pub fn configure(config: &ClaimCheckConfig, backends: &BackendRegistry) -> ClaimCheckResult<Self> {
        Ok(Self::new(backends.create(config)?))
    }
}

impl Deserializer<PayloadStream> for ClaimCheckStreamingDeserializer {
    fn codec_id(&self) -> &'static str {
        CLAIM_CHECK_DESERIALIZER
    }

    fn deserialize(&self, topic: &str, headers: &Headers, data: Option<&[u8]>) -> ClaimCheckResult<Option<PayloadStream>> {
        match ClaimCheckOutcome::from_headers(headers)? {
            ClaimCheckOutcome::Failed(description) => Err(ClaimCheckError::Externalization { description }),
            ClaimCheckOutcome::Externalized(claim_check) => {
                trace!("received streaming claim check: topic={}, ref={}", topic, claim_check);
                self.backend.check_out_streaming(&claim_check).map(Some)
            }
            ClaimCheckOutcome::Passthrough => Ok(data.map(|bytes| PayloadStream::from_bytes(bytes.to_vec()))),
        }
    }

    fn close(&self) {
        self.backend.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::codec::bytes::StringCodec;
    use crate::headers::{HEADER_MESSAGE_CLAIM_CHECK, HEADER_MESSAGE_CLAIM_CHECK_ERROR};
    use crate::{ClaimCheck, ErrorKind};

    fn backend() -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::new().create_containers_if_missing())
    }

    #[test]
    fn test_checks_out_referenced_value() {
        let backend = backend();
        let claim_check = backend.check_in("t", b"stored value").unwrap();
        let headers = Headers::new().with(HEADER_MESSAGE_CLAIM_CHECK, claim_check.to_bytes());
        let deserializer = ClaimCheckDeserializer::<String>::new(backend, Arc::new(StringCodec));

        let value = deserializer.deserialize("t", &headers, Some(&[][..])).unwrap();

        assert_eq!(value.as_deref(), Some("stored value"));
    }

    #[test]
    fn test_plain_value_is_decoded_directly() {
        let deserializer = ClaimCheckDeserializer::<String>::new(backend(), Arc::new(StringCodec));

        let value = deserializer.deserialize("t", &Headers::new(), Some(&b"inline"[..])).unwrap();

        assert_eq!(value.as_deref(), Some("inline"));
        assert_eq!(deserializer.deserialize("t", &Headers::new(), None).unwrap(), None);
    }

    #[test]
    fn test_check_out_failures_propagate() {
        let deserializer = ClaimCheckDeserializer::<String>::new(backend(), Arc::new(StringCodec));
        let headers = Headers::new().with(HEADER_MESSAGE_CLAIM_CHECK, "s3://bucket/key");

        let err = deserializer.deserialize("t", &headers, Some(&[][..])).unwrap_err();

        assert!(err.is_bad_reference());
    }

    #[test]
    fn test_error_header_is_fatal() {
        let deserializer = ClaimCheckDeserializer::<String>::new(backend(), Arc::new(StringCodec));
        let headers = Headers::new().with(HEADER_MESSAGE_CLAIM_CHECK_ERROR, "boom");

        let err = deserializer.deserialize("t", &headers, Some(&b"x"[..])).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::BackendFailure);
    }

    #[test]
    fn test_streaming_deserializer() {
        let backend = backend();
        let claim_check: ClaimCheck = backend.check_in("t", b"streamed").unwrap();
        let deserializer = ClaimCheckStreamingDeserializer::new(backend);

        let headers = Headers::new().with(HEADER_MESSAGE_CLAIM_CHECK, claim_check.to_bytes());
        let stream = deserializer.deserialize("t", &headers, Some(&[][..])).unwrap().unwrap();
        assert_eq!(stream.read_to_end_vec().unwrap(), b"streamed");

        let inline = deserializer
            .deserialize("t", &Headers::new(), Some(&b"inline"[..]))
            .unwrap()
            .unwrap();
        assert_eq!(inline.read_to_end_vec().unwrap(), b"inline");
    }
}
