use std::sync::Arc;

use chrono::Utc;
use tracing::{error, trace};

use crate::backend::{BackendRegistry, ClaimCheckBackend};
use crate::codec::{CodecRegistry, Serializer};
use crate::config::{keys, ClaimCheckConfig, DEFAULT_CHECKIN_SIZE_OVER_BYTES};
use crate::producer::{describe_failure, ProducerInterceptor, CLAIM_CHECK_SERIALIZER};
use crate::size::{RecordBatchSizeEstimator, SizeEstimator};
use crate::{ClaimCheck, ClaimCheckError, ClaimCheckOutcome, ClaimCheckResult, ProducerRecord};

/// Checks in values whose record would exceed the size threshold.
///
/// Never fails a send: a failed check-in keeps the original value and
/// records the failure in the error header, which [`ClaimCheckSerializer`]
/// turns into an error for the caller.
///
/// [`ClaimCheckSerializer`]: crate::producer::ClaimCheckSerializer
pub struct ClaimCheckProducerInterceptor<K, V> {
    key_serializer: Arc<dyn Serializer<K>>,
    value_serializer: Arc<dyn Serializer<V>>,
    backend: Arc<dyn ClaimCheckBackend>,
    estimator: Arc<dyn SizeEstimator>,
    threshold: u64,
}

impl<K, V> ClaimCheckProducerInterceptor<K, V> {
    /// `value_serializer` is the wrapped serializer, not the claim check one
    pub fn new(
        backend: Arc<dyn ClaimCheckBackend>,
        key_serializer: Arc<dyn Serializer<K>>,
        value_serializer: Arc<dyn Serializer<V>>,
    ) -> Self {
        Self {
            key_serializer,
            value_serializer,
            backend,
            estimator: Arc::new(RecordBatchSizeEstimator),
            threshold: DEFAULT_CHECKIN_SIZE_OVER_BYTES,
        }
    }

    /// Build from configuration. Fails unless `value.serializer` is the
    /// claim check serializer, since check-in failures would otherwise
    /// never reach the caller.
    pub fn configure(
        config: &ClaimCheckConfig,
        key_codecs: &CodecRegistry<K>,
        value_codecs: &CodecRegistry<V>,
        backends: &BackendRegistry,
    ) -> ClaimCheckResult<Self> {
        ensure_claim_check_serializer(config, "ClaimCheckProducerInterceptor")?;

        let key_id = ClaimCheckConfig::require_codec(&config.key_serializer, keys::KEY_SERIALIZER)?;
        let value_id = ClaimCheckConfig::require_codec(&config.wrapped_value_serializer, keys::WRAPPED_VALUE_SERIALIZER)?;

        Ok(Self::new(
            backends.create(config)?,
            key_codecs.serializer(key_id)?,
            value_codecs.serializer(value_id)?,
        )
        .with_threshold(config.threshold_bytes))
    }

    pub fn with_threshold(mut self, bytes: u64) -> Self {
        self.threshold = bytes;
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn SizeEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn backend(&self) -> &Arc<dyn ClaimCheckBackend> {
        &self.backend
    }

    /// Check the value in if the record is over the threshold
    fn check_in(&self, record: &ProducerRecord<K, V>) -> ClaimCheckResult<Option<ClaimCheck>> {
        let Some(value) = record.value.as_ref() else {
            return Ok(None);
        };

        let key_bytes = self
            .key_serializer
            .serialize(&record.topic, &record.headers, record.key.as_ref())?;
        let Some(value_bytes) = self
            .value_serializer
            .serialize(&record.topic, &record.headers, Some(value))?
        else {
            return Ok(None);
        };

        let timestamp = record.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis());
        let estimate = self.estimator.estimate(
            key_bytes.as_deref(),
            Some(value_bytes.len() as u64),
            &record.headers,
            timestamp,
        );
        if estimate <= self.threshold {
            trace!("record under threshold: topic={}, estimate={}, threshold={}", record.topic, estimate, self.threshold);
            return Ok(None);
        }

        self.backend.check_in(&record.topic, &value_bytes).map(Some)
    }
}

impl<K, V> ProducerInterceptor<K, V> for ClaimCheckProducerInterceptor<K, V> {
    fn on_send(&self, mut record: ProducerRecord<K, V>) -> ClaimCheckResult<ProducerRecord<K, V>> {
        let outcome = match self.check_in(&record) {
            Ok(None) => return Ok(record),
            Ok(Some(claim_check)) => ClaimCheckOutcome::Externalized(claim_check),
            Err(e) => {
                error!("claim check failed, sending error header: topic={}, error={}", record.topic, e);
                ClaimCheckOutcome::Failed(describe_failure(
                    e,
                    format!("check-in failed for topic {}", record.topic),
                ))
            }
        };

        let headers = outcome.apply(record.headers.clone());
        let value = match outcome {
            ClaimCheckOutcome::Externalized(_) => None,
            _ => record.value.take(),
        };
        Ok(record.replace_value(value, headers))
    }

    fn close(&self) {
        self.key_serializer.close();
        self.value_serializer.close();
        self.backend.close();
    }
}

pub(crate) fn ensure_claim_check_serializer(config: &ClaimCheckConfig, component: &str) -> ClaimCheckResult<()> {
    match config.value_serializer.as_deref() {
        Some(CLAIM_CHECK_SERIALIZER) => Ok(()),
        _ => Err(ClaimCheckError::config(format!(
            "{component} must be used with {CLAIM_CHECK_SERIALIZER} as {} to guarantee propagation of exceptions to the client",
            keys::VALUE_SERIALIZER
        ))),
    }
}
