use std::sync::Arc;

use crate::codec::{CodecRegistry, Serializer};
use crate::headers::payload_size;
use crate::{ClaimCheckError, ClaimCheckResult, Headers, PayloadStream};

/// Materializes a streamed value that stayed below the threshold.
///
/// Reads exactly the declared payload size from the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputStreamSerializer;

impl Serializer<PayloadStream> for InputStreamSerializer {
    fn codec_id(&self) -> &'static str {
        "input-stream"
    }

    fn serialize(&self, _topic: &str, headers: &Headers, data: Option<&PayloadStream>) -> ClaimCheckResult<Option<Vec<u8>>> {
        let Some(stream) = data else {
            return Ok(None);
        };

        let size = payload_size(headers)?;
        let bytes = stream.read_exact_vec(size).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ClaimCheckError::contract(format!(
                "stream ended before the declared payload size of {size} bytes"
            )),
            _ => ClaimCheckError::from(e),
        })?;

        Ok(Some(bytes))
    }
}

impl CodecRegistry<PayloadStream> {
    /// Registry holding the `input-stream` serializer
    pub fn for_streams() -> Self {
        let mut registry = Self::new();
        registry.register_serializer(Arc::new(InputStreamSerializer));
        registry
    }
}
