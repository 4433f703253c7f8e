use std::sync::Arc;

use crate::codec::{CodecRegistry, Deserializer, Serializer};
use crate::{ClaimCheckError, ClaimCheckResult, Headers};

/// Raw byte values, passed through untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl Serializer<Vec<u8>> for BytesCodec {
    fn codec_id(&self) -> &'static str {
        "bytes"
    }

    fn serialize(&self, _topic: &str, _headers: &Headers, data: Option<&Vec<u8>>) -> ClaimCheckResult<Option<Vec<u8>>> {
        Ok(data.cloned())
    }
}

impl Deserializer<Vec<u8>> for BytesCodec {
    fn codec_id(&self) -> &'static str {
        "bytes"
    }

    fn deserialize(&self, _topic: &str, _headers: &Headers, data: Option<&[u8]>) -> ClaimCheckResult<Option<Vec<u8>>> {
        Ok(data.map(<[u8]>::to_vec))
    }
}

/// UTF-8 string values
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl Serializer<String> for StringCodec {
    fn codec_id(&self) -> &'static str {
        "string"
    }

    fn serialize(&self, _topic: &str, _headers: &Headers, data: Option<&String>) -> ClaimCheckResult<Option<Vec<u8>>> {
        Ok(data.map(|s| s.as_bytes().to_vec()))
    }
}

impl Deserializer<String> for StringCodec {
    fn codec_id(&self) -> &'static str {
        "string"
    }

    fn deserialize(&self, _topic: &str, _headers: &Headers, data: Option<&[u8]>) -> ClaimCheckResult<Option<String>> {
        data.map(|bytes| String::from_utf8(bytes.to_vec()).map_err(ClaimCheckError::serialization))
            .transpose()
    }
}

impl CodecRegistry<Vec<u8>> {
    /// Registry holding the `bytes` codec
    pub fn for_bytes() -> Self {
        let mut registry = Self::new();
        registry
            .register_serializer(Arc::new(BytesCodec))
            .register_deserializer(Arc::new(BytesCodec));
        registry
    }
}

impl CodecRegistry<String> {
    /// Registry holding the `string` codec
    pub fn for_strings() -> Self {
        let mut registry = Self::new();
        registry
            .register_serializer(Arc::new(StringCodec))
            .register_deserializer(Arc::new(StringCodec));
        registry
    }
}
