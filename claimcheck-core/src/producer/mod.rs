//! Producer side: the interceptor that decides and performs check-in, and
//! the value serializer that surfaces check-in failures to the caller.

pub mod interceptor;
pub mod serializer;
pub mod streaming;

use std::error::Error;

use crate::{ClaimCheckResult, ProducerRecord};

pub use interceptor::ClaimCheckProducerInterceptor;
pub use serializer::{ClaimCheckSerializer, CLAIM_CHECK_SERIALIZER};
pub use streaming::ClaimCheckStreamingProducerInterceptor;

/// Interception stage run before encoding.
///
/// The host pipeline discards errors returned from `on_send` and sends the
/// record it passed in.
pub trait ProducerInterceptor<K, V>: Send + Sync {
    fn on_send(&self, record: ProducerRecord<K, V>) -> ClaimCheckResult<ProducerRecord<K, V>>;

    /// Called once the broker acknowledged (or rejected) a record
    fn on_acknowledgement(&self, _topic: &str, _error: Option<&(dyn Error + 'static)>) {}

    fn close(&self) {}
}

/// Full failure text for the error header, causes included
pub(crate) fn describe_failure<E>(error: E, context: String) -> String
where
    E: Error + Send + Sync + 'static,
{
    format!("{:?}", anyhow::Error::new(error).context(context))
}
