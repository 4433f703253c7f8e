use std::sync::Arc;

use chrono::Utc;
use tracing::{error, trace};

use crate::backend::{BackendRegistry, ClaimCheckBackend};
use crate::codec::{CodecRegistry, Serializer};
use crate::config::{keys, ClaimCheckConfig, DEFAULT_CHECKIN_SIZE_OVER_BYTES};
use crate::headers::payload_size;
use crate::producer::interceptor::ensure_claim_check_serializer;
use crate::producer::{describe_failure, ProducerInterceptor};
use crate::size::{RecordBatchSizeEstimator, SizeEstimator};
use crate::{ClaimCheck, ClaimCheckOutcome, ClaimCheckResult, PayloadStream, ProducerRecord};

/// Streaming counterpart of
/// [`ClaimCheckProducerInterceptor`](crate::producer::ClaimCheckProducerInterceptor).
///
/// Values are streams whose length the caller declares in the
/// payload-size header. The size decision uses the declared length, and
/// check-in reads the stream straight into the backend.
pub struct ClaimCheckStreamingProducerInterceptor<K> {
    key_serializer: Arc<dyn Serializer<K>>,
    backend: Arc<dyn ClaimCheckBackend>,
    estimator: Arc<dyn SizeEstimator>,
    threshold: u64,
}

impl<K> ClaimCheckStreamingProducerInterceptor<K> {
    pub fn new(backend: Arc<dyn ClaimCheckBackend>, key_serializer: Arc<dyn Serializer<K>>) -> Self {
        Self {
            key_serializer,
            backend,
            estimator: Arc::new(RecordBatchSizeEstimator),
            threshold: DEFAULT_CHECKIN_SIZE_OVER_BYTES,
        }
    }

    /// Build from configuration; `value.serializer` must be the claim check serializer
    pub fn configure(
        config: &ClaimCheckConfig,
        key_codecs: &CodecRegistry<K>,
        backends: &BackendRegistry,
    ) -> ClaimCheckResult<Self> {
        ensure_claim_check_serializer(config, "ClaimCheckStreamingProducerInterceptor")?;
        let key_id = ClaimCheckConfig::require_codec(&config.key_serializer, keys::KEY_SERIALIZER)?;

        Ok(Self::new(backends.create(config)?, key_codecs.serializer(key_id)?).with_threshold(config.threshold_bytes))
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

    fn check_in(&self, record: &ProducerRecord<K, PayloadStream>, size: u64) -> ClaimCheckResult<Option<ClaimCheck>> {
        let Some(stream) = record.value.as_ref() else {
            return Ok(None);
        };

        let key_bytes = self
            .key_serializer
            .serialize(&record.topic, &record.headers, record.key.as_ref())?;
        let timestamp = record.timestamp.unwrap_or_else(|| Utc::now().timestamp_millis());
        let estimate = self
            .estimator
            .estimate(key_bytes.as_deref(), Some(size), &record.headers, timestamp);
        if estimate <= self.threshold {
            trace!("stream under threshold: topic={}, estimate={}, threshold={}", record.topic, estimate, self.threshold);
            return Ok(None);
        }

        let mut reader = stream.clone();
        self.backend
            .check_in_streaming(&record.topic, &mut reader, size)
            .map(Some)
    }
}

impl<K> ProducerInterceptor<K, PayloadStream> for ClaimCheckStreamingProducerInterceptor<K> {
    /// A missing payload-size header fails before anything else happens.
    fn on_send(&self, mut record: ProducerRecord<K, PayloadStream>) -> ClaimCheckResult<ProducerRecord<K, PayloadStream>> {
        let size = payload_size(&record.headers)?;

        let outcome = match self.check_in(&record, size) {
            Ok(None) => return Ok(record),
            Ok(Some(claim_check)) => ClaimCheckOutcome::Externalized(claim_check),
            Err(e) => {
                error!("streaming claim check failed, sending error header: topic={}, error={}", record.topic, e);
                ClaimCheckOutcome::Failed(describe_failure(
                    e,
                    format!("streaming check-in failed for topic {}", record.topic),
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
        self.backend.close();
    }
}
