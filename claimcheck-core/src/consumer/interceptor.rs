use std::sync::Arc;

use tracing::trace;

use crate::backend::{BackendRegistry, ClaimCheckBackend};
use crate::codec::{CodecRegistry, Deserializer};
use crate::config::{keys, ClaimCheckConfig};
use crate::consumer::deserializer::CLAIM_CHECK_DESERIALIZER;
use crate::consumer::ConsumerInterceptor;
use crate::{ClaimCheckError, ClaimCheckOutcome, ClaimCheckResult, ConsumerRecord, ConsumerRecords};

/// Restores checked-in values after the batch was decoded.
///
/// Used when the consumer keeps its plain value deserializer: records
/// carrying a reference get their value replaced by the checked-out
/// payload run through `deserializer`, all others pass untouched.
pub struct DeserializingClaimCheckConsumerInterceptor<K, V> {
    deserializer: Arc<dyn Deserializer<V>>,
    backend: Arc<dyn ClaimCheckBackend>,
    _key: std::marker::PhantomData<fn() -> K>,
}

impl<K, V> DeserializingClaimCheckConsumerInterceptor<K, V> {
    pub fn new(backend: Arc<dyn ClaimCheckBackend>, deserializer: Arc<dyn Deserializer<V>>) -> Self {
        Self {
            deserializer,
            backend,
            _key: std::marker::PhantomData,
        }
    }

    /// Decode checked-out payloads with the consumer's own `value.deserializer`
    pub fn configure(
        config: &ClaimCheckConfig,
        value_codecs: &CodecRegistry<V>,
        backends: &BackendRegistry,
    ) -> ClaimCheckResult<Self> {
        let id = ClaimCheckConfig::require_codec(&config.value_deserializer, keys::VALUE_DESERIALIZER)?;
        // the claim check deserializer would check the payload out a second time
        if id == CLAIM_CHECK_DESERIALIZER {
            return Err(ClaimCheckError::config(format!(
                "DeserializingClaimCheckConsumerInterceptor must not be used with {CLAIM_CHECK_DESERIALIZER} as {}",
                keys::VALUE_DESERIALIZER
            )));
        }
        Ok(Self::new(backends.create(config)?, value_codecs.deserializer(id)?))
    }

    fn reconstitute(&self, record: ConsumerRecord<K, V>) -> ClaimCheckResult<ConsumerRecord<K, V>> {
        match ClaimCheckOutcome::from_headers(&record.headers)? {
            ClaimCheckOutcome::Passthrough => Ok(record),
            ClaimCheckOutcome::Failed(description) => Err(ClaimCheckError::Externalization { description }),
            ClaimCheckOutcome::Externalized(claim_check) => {
                trace!(
                    "received claim check: topic={}, partition={}, offset={}, ref={}",
                    record.topic,
                    record.partition,
                    record.offset,
                    claim_check
                );
                let payload = self.backend.check_out(&claim_check)?;
                let value = self
                    .deserializer
                    .deserialize(&record.topic, &record.headers, Some(payload.as_slice()))?;
                Ok(record.replace_value(value))
            }
        }
    }
}

impl<K, V> ConsumerInterceptor<K, V> for DeserializingClaimCheckConsumerInterceptor<K, V> {
    fn on_consume(&self, records: ConsumerRecords<K, V>) -> ClaimCheckResult<ConsumerRecords<K, V>> {
        records
            .into_iter()
            .map(|record| self.reconstitute(record))
            .collect()
    }

    fn close(&self) {
        self.deserializer.close();
        self.backend.close();
    }
}
