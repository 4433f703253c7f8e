//! Synchronous model of a pub/sub client's record pipeline.
//!
//! Stage contracts follow the host client: producer interceptor errors are
//! logged and discarded (the record goes on unchanged), serializer errors
//! fail the send, and every consumer-side error fails the poll.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::codec::{Deserializer, Serializer};
use crate::consumer::ConsumerInterceptor;
use crate::producer::ProducerInterceptor;
use crate::{ClaimCheckResult, ConsumerRecord, ConsumerRecords, ProducerRecord, WireRecord};

/// Interceptors then serializers, once per record on the caller's thread
pub struct ProducerPipeline<K, V> {
    interceptors: Vec<Arc<dyn ProducerInterceptor<K, V>>>,
    key_serializer: Arc<dyn Serializer<K>>,
    value_serializer: Arc<dyn Serializer<V>>,
    next_offset: AtomicI64,
}

impl<K: Clone, V: Clone> ProducerPipeline<K, V> {
    pub fn new(key_serializer: Arc<dyn Serializer<K>>, value_serializer: Arc<dyn Serializer<V>>) -> Self {
        Self {
            interceptors: Vec::new(),
            key_serializer,
            value_serializer,
            next_offset: AtomicI64::new(0),
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn ProducerInterceptor<K, V>>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Run the record through every stage and return what the broker would store
    pub fn send(&self, record: ProducerRecord<K, V>) -> ClaimCheckResult<WireRecord> {
        let mut record = record;
        for interceptor in &self.interceptors {
            let before = record.clone();
            record = match interceptor.on_send(record) {
                Ok(intercepted) => intercepted,
                Err(e) => {
                    warn!("error executing interceptor onSend callback: topic={}, error={}", before.topic, e);
                    before
                }
            };
        }

        let key = self
            .key_serializer
            .serialize(&record.topic, &record.headers, record.key.as_ref())?;
        let value = self
            .value_serializer
            .serialize(&record.topic, &record.headers, record.value.as_ref())?;

        let wire = WireRecord {
            topic: record.topic.clone(),
            partition: record.partition.unwrap_or(0),
            offset: self.next_offset.fetch_add(1, Ordering::SeqCst),
            timestamp: record.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
            key,
            value,
            headers: record.headers,
        };

        for interceptor in &self.interceptors {
            interceptor.on_acknowledgement(&wire.topic, None);
        }
        Ok(wire)
    }

    pub fn close(&self) {
        for interceptor in &self.interceptors {
            interceptor.close();
        }
        self.key_serializer.close();
        self.value_serializer.close();
    }
}

/// Deserializers then interceptors, once per polled batch
pub struct ConsumerPipeline<K, V> {
    key_deserializer: Arc<dyn Deserializer<K>>,
    value_deserializer: Arc<dyn Deserializer<V>>,
    interceptors: Vec<Arc<dyn ConsumerInterceptor<K, V>>>,
}

impl<K, V> ConsumerPipeline<K, V> {
    pub fn new(key_deserializer: Arc<dyn Deserializer<K>>, value_deserializer: Arc<dyn Deserializer<V>>) -> Self {
        Self {
            key_deserializer,
            value_deserializer,
            interceptors: Vec::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn ConsumerInterceptor<K, V>>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Decode a fetched batch and hand it through the interceptors
    pub fn poll(&self, fetched: Vec<WireRecord>) -> ClaimCheckResult<ConsumerRecords<K, V>> {
        let mut records = fetched
            .into_iter()
            .map(|wire| self.decode(wire))
            .collect::<ClaimCheckResult<ConsumerRecords<K, V>>>()?;

        for interceptor in &self.interceptors {
            records = interceptor.on_consume(records)?;
        }
        Ok(records)
    }

    fn decode(&self, wire: WireRecord) -> ClaimCheckResult<ConsumerRecord<K, V>> {
        let key = self
            .key_deserializer
            .deserialize(&wire.topic, &wire.headers, wire.key.as_deref())?;
        let value = self
            .value_deserializer
            .deserialize(&wire.topic, &wire.headers, wire.value.as_deref())?;

        Ok(ConsumerRecord {
            topic: wire.topic,
            partition: wire.partition,
            offset: wire.offset,
            timestamp: wire.timestamp,
            key,
            value,
            headers: wire.headers,
        })
    }

    pub fn close(&self) {
        for interceptor in &self.interceptors {
            interceptor.close();
        }
        self.key_deserializer.close();
        self.value_deserializer.close();
    }
}
