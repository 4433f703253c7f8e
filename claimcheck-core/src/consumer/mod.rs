//! Consumer side: restoring checked-in values, either while decoding or
//! as a batch interceptor after decoding.

pub mod deserializer;
pub mod interceptor;

use std::collections::BTreeMap;

use crate::{ClaimCheckResult, ConsumerRecords, TopicPartition};

pub use deserializer::{ClaimCheckDeserializer, ClaimCheckStreamingDeserializer, CLAIM_CHECK_DESERIALIZER};
pub use interceptor::DeserializingClaimCheckConsumerInterceptor;

/// Interception stage run on each polled batch, after decoding.
///
/// Errors propagate to the caller of the poll.
pub trait ConsumerInterceptor<K, V>: Send + Sync {
    fn on_consume(&self, records: ConsumerRecords<K, V>) -> ClaimCheckResult<ConsumerRecords<K, V>>;

    /// Called when offsets are committed
    fn on_commit(&self, _offsets: &BTreeMap<TopicPartition, i64>) {}

    fn close(&self) {}
}
