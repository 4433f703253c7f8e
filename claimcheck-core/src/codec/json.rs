use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{CodecRegistry, Deserializer, Serializer};
use crate::{ClaimCheckResult, Headers};

/// JSON values through serde
#[derive(Debug)]
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T: Serialize> Serializer<T> for JsonCodec<T> {
    fn codec_id(&self) -> &'static str {
        "json"
    }

    fn serialize(&self, _topic: &str, _headers: &Headers, data: Option<&T>) -> ClaimCheckResult<Option<Vec<u8>>> {
        data.map(|value| serde_json::to_vec(value).map_err(Into::into))
            .transpose()
    }
}

impl<T: DeserializeOwned> Deserializer<T> for JsonCodec<T> {
    fn codec_id(&self) -> &'static str {
        "json"
    }

    fn deserialize(&self, _topic: &str, _headers: &Headers, data: Option<&[u8]>) -> ClaimCheckResult<Option<T>> {
        data.map(|bytes| serde_json::from_slice(bytes).map_err(Into::into))
            .transpose()
    }
}

impl<T: Serialize + DeserializeOwned + 'static> CodecRegistry<T> {
    /// Registry holding the `json` codec for `T`
    pub fn for_json() -> Self {
        let mut registry = Self::new();
        registry
            .register_serializer(Arc::new(JsonCodec::<T>::new()))
            .register_deserializer(Arc::new(JsonCodec::<T>::new()));
        registry
    }
}
