pub mod bytes;
pub mod json;
pub mod stream;

use std::collections::HashMap;
use std::sync::Arc;

use crate::{ClaimCheckError, ClaimCheckResult, Headers};

/// Encoding stage: turns a logical value into wire bytes.
///
/// Errors raised here reach the caller of the send operation.
pub trait Serializer<T>: Send + Sync {
    /// Codec identifier used in configuration
    fn codec_id(&self) -> &'static str;

    fn serialize(&self, topic: &str, headers: &Headers, data: Option<&T>) -> ClaimCheckResult<Option<Vec<u8>>>;

    fn close(&self) {}
}

/// Decoding stage: turns wire bytes back into a logical value.
///
/// Errors raised here reach the caller of the read operation.
pub trait Deserializer<T>: Send + Sync {
    /// Codec identifier used in configuration
    fn codec_id(&self) -> &'static str;

    fn deserialize(&self, topic: &str, headers: &Headers, data: Option<&[u8]>) -> ClaimCheckResult<Option<T>>;

    fn close(&self) {}
}

/// Serializers and deserializers for one value type, addressed by codec id
pub struct CodecRegistry<T> {
    serializers: HashMap<String, Arc<dyn Serializer<T>>>,
    deserializers: HashMap<String, Arc<dyn Deserializer<T>>>,
}

impl<T> CodecRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            serializers: HashMap::new(),
            deserializers: HashMap::new(),
        }
    }

    pub fn register_serializer(&mut self, serializer: Arc<dyn Serializer<T>>) -> &mut Self {
        self.serializers.insert(serializer.codec_id().to_string(), serializer);
        self
    }

    pub fn register_deserializer(&mut self, deserializer: Arc<dyn Deserializer<T>>) -> &mut Self {
        self.deserializers.insert(deserializer.codec_id().to_string(), deserializer);
        self
    }

    pub fn serializer(&self, codec_id: &str) -> ClaimCheckResult<Arc<dyn Serializer<T>>> {
        self.serializers
            .get(codec_id)
            .cloned()
            .ok_or_else(|| ClaimCheckError::config(format!("Serializer not registered: {codec_id}")))
    }

    pub fn deserializer(&self, codec_id: &str) -> ClaimCheckResult<Arc<dyn Deserializer<T>>> {
        self.deserializers
            .get(codec_id)
            .cloned()
            .ok_or_else(|| ClaimCheckError::config(format!("Deserializer not registered: {codec_id}")))
    }

    /// List registered serializer ids
    pub fn available_serializers(&self) -> Vec<String> {
        self.serializers.keys().cloned().collect()
    }
}

impl<T> Default for CodecRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CodecRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            serializers: self.serializers.clone(),
            deserializers: self.deserializers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::bytes::StringCodec;
    use crate::ErrorKind;

    #[test]
    fn test_lookup_by_codec_id() {
        let registry = CodecRegistry::<String>::for_strings();

        let serializer = registry.serializer("string").unwrap();
        let encoded = serializer
            .serialize("t", &Headers::new(), Some(&"hi".to_string()))
            .unwrap();
        assert_eq!(encoded.as_deref(), Some(&b"hi"[..]));
        assert_eq!(registry.deserializer("string").unwrap().codec_id(), "string");
    }

    #[test]
    fn test_unknown_codec_is_config_failure() {
        let mut registry = CodecRegistry::<String>::new();
        registry.register_serializer(Arc::new(StringCodec));

        let err = registry.deserializer("string").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ConfigFailure);
        assert!(registry.serializer("avro").is_err());
    }
}
