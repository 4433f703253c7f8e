//! # claimcheck-core: Claim Check Interceptors
//!
//! Moves oversized record values out of the broker's data path. A producer
//! interceptor checks large values into a storage backend and leaves a
//! reference header behind; a consumer deserializer or interceptor uses
//! the reference to check the payload back out.
//!
//! ## Producer handshake
//!
//! Host clients discard errors raised by producer interceptors, so the
//! interceptor never fails. A failed check-in keeps the original value and
//! adds an error header, and [`ClaimCheckSerializer`], configured as the
//! value serializer, raises it to the caller of `send`.
//!
//! ```rust
//! use std::sync::Arc;
//! use claimcheck_core::prelude::*;
//!
//! let backend: Arc<dyn ClaimCheckBackend> =
//!     Arc::new(MemoryBackend::new().create_containers_if_missing());
//!
//! let producer = ProducerPipeline::<String, String>::new(
//!     Arc::new(StringCodec),
//!     Arc::new(ClaimCheckSerializer::<String>::new(Arc::new(StringCodec))),
//! )
//! .with_interceptor(Arc::new(
//!     ClaimCheckProducerInterceptor::<String, String>::new(backend.clone(), Arc::new(StringCodec), Arc::new(StringCodec))
//!         .with_threshold(1024),
//! ));
//!
//! let consumer = ConsumerPipeline::<String, String>::new(
//!     Arc::new(StringCodec),
//!     Arc::new(ClaimCheckDeserializer::<String>::new(backend, Arc::new(StringCodec))),
//! );
//!
//! let payload = "x".repeat(4096);
//! let wire = producer.send(ProducerRecord::new("orders", Some(payload.clone()))).unwrap();
//! assert_eq!(wire.value, Some(Vec::new()));
//!
//! let records = consumer.poll(vec![wire]).unwrap().into_vec();
//! assert_eq!(records[0].value.as_deref(), Some(payload.as_str()));
//! ```
//!
//! ## Streaming
//!
//! With [`ClaimCheckStreamingProducerInterceptor`] values are
//! [`PayloadStream`]s. The caller declares the stream length with
//! [`headers::set_payload_size`] before sending.

pub mod backend;
pub mod claim_check;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod error;
pub mod headers;
pub mod pipeline;
pub mod producer;
pub mod record;
pub mod size;
pub mod stream;

pub use backend::{BackendRegistry, ClaimCheckBackend, ConfigurableBackend, ContainerCache, FileSystemBackend, MemoryBackend};
pub use claim_check::{ClaimCheck, ClaimCheckOutcome};
pub use codec::{CodecRegistry, Deserializer, Serializer};
pub use config::{BackendKind, ClaimCheckConfig, ConfigMap};
pub use consumer::{
    ClaimCheckDeserializer, ClaimCheckStreamingDeserializer, ConsumerInterceptor,
    DeserializingClaimCheckConsumerInterceptor,
};
pub use error::{ClaimCheckError, ClaimCheckResult, ErrorKind};
pub use pipeline::{ConsumerPipeline, ProducerPipeline};
pub use producer::{
    ClaimCheckProducerInterceptor, ClaimCheckSerializer, ClaimCheckStreamingProducerInterceptor, ProducerInterceptor,
};
pub use record::{ConsumerRecord, ConsumerRecords, Header, Headers, ProducerRecord, TopicPartition, WireRecord};
pub use size::{RecordBatchSizeEstimator, SizeEstimator};
pub use stream::PayloadStream;

/// Everything needed to wire up claim check producers and consumers
pub mod prelude {
    pub use crate::{
        BackendKind, BackendRegistry, ClaimCheck, ClaimCheckBackend, ClaimCheckConfig, ClaimCheckError,
        ClaimCheckResult, CodecRegistry, ConfigMap, ConsumerPipeline, Deserializer, ErrorKind, Headers,
        MemoryBackend, PayloadStream, ProducerPipeline, ProducerRecord, Serializer,
    };

    pub use crate::{
        ClaimCheckDeserializer, ClaimCheckProducerInterceptor, ClaimCheckSerializer,
        ClaimCheckStreamingDeserializer, ClaimCheckStreamingProducerInterceptor, ConsumerInterceptor,
        DeserializingClaimCheckConsumerInterceptor, ProducerInterceptor,
    };

    pub use crate::codec::bytes::{BytesCodec, StringCodec};
    pub use crate::codec::json::JsonCodec;
    pub use crate::codec::stream::InputStreamSerializer;
}
