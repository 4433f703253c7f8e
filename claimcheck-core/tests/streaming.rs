mod common;

use std::io::Read;
use std::sync::Arc;

use claimcheck_core::headers::{payload_size, HEADER_MESSAGE_CLAIM_CHECK, HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE};
use claimcheck_core::prelude::*;
use claimcheck_core::FileSystemBackend;

use common::{random_bytes, stream_record, FakeBackend, FAKE_BACKEND_FAILURE};

fn producer(backend: Arc<dyn ClaimCheckBackend>, threshold: u64) -> ProducerPipeline<String, PayloadStream> {
    ProducerPipeline::new(
        Arc::new(StringCodec),
        Arc::new(ClaimCheckSerializer::<PayloadStream>::new(Arc::new(InputStreamSerializer))),
    )
    .with_interceptor(Arc::new(
        ClaimCheckStreamingProducerInterceptor::<String>::new(backend, Arc::new(StringCodec)).with_threshold(threshold),
    ))
}

fn consumer(backend: Arc<dyn ClaimCheckBackend>) -> ConsumerPipeline<String, PayloadStream> {
    ConsumerPipeline::new(
        Arc::new(StringCodec),
        Arc::new(ClaimCheckStreamingDeserializer::new(backend)),
    )
}

fn read_all(mut stream: PayloadStream) -> Vec<u8> {
    let mut buffer = Vec::new();
    stream.read_to_end(&mut buffer).unwrap();
    buffer
}

fn assert_streaming_round_trip(backend: Arc<dyn ClaimCheckBackend>) {
    // Arrange
    let producer = producer(backend.clone(), 1024);
    let consumer = consumer(backend);
    let payload = random_bytes(256 * 1024);

    // Act
    let wire = producer.send(stream_record("media", "clip-1", payload.clone())).unwrap();

    // Assert: sentinel on the wire, declared size still present
    assert_eq!(wire.value, Some(Vec::new()));
    assert!(wire.headers.contains(HEADER_MESSAGE_CLAIM_CHECK));
    assert_eq!(payload_size(&wire.headers).unwrap(), payload.len() as u64);

    let record = consumer.poll(vec![wire]).unwrap().into_vec().remove(0);
    assert_eq!(record.key.as_deref(), Some("clip-1"));
    assert_eq!(read_all(record.value.unwrap()), payload);
}

/// S1. Streaming round trip through the in-memory backend
#[test_log::test]
fn test_streaming_round_trip_memory() {
    assert_streaming_round_trip(Arc::new(MemoryBackend::new().create_containers_if_missing()));
}

/// S2. Streaming round trip through the filesystem backend
#[test_log::test]
fn test_streaming_round_trip_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let backend = FileSystemBackend::new(dir.path()).unwrap().create_containers_if_missing();

    assert_streaming_round_trip(Arc::new(backend));
}

/// S3. Small stream is materialized inline
#[test_log::test]
fn test_small_stream_passes_through() {
    let backend = Arc::new(FakeBackend::new());
    let producer = producer(backend.clone(), 1024);
    let consumer = consumer(backend.clone());

    let wire = producer.send(stream_record("t", "k", b"tiny".to_vec())).unwrap();

    assert_eq!(wire.value.as_deref(), Some(&b"tiny"[..]));
    assert!(!wire.headers.contains(HEADER_MESSAGE_CLAIM_CHECK));
    assert_eq!(backend.check_in_calls(), 0);

    let record = consumer.poll(vec![wire]).unwrap().into_vec().remove(0);
    assert_eq!(read_all(record.value.unwrap()), b"tiny");
}

/// S4. Missing payload-size header fails the send before any backend call
#[test_log::test]
fn test_missing_size_header_is_contract_violation() {
    let backend = Arc::new(FakeBackend::new());
    let producer = producer(backend.clone(), 0);
    let record = ProducerRecord::<String, PayloadStream>::new("t", Some(PayloadStream::from_bytes(random_bytes(4096))));

    // Act
    let err = producer.send(record).unwrap_err();

    // Assert
    assert_eq!(err.kind(), ErrorKind::ContractViolation);
    assert!(err.to_string().contains(HEADER_MESSAGE_CLAIM_CHECK_PAYLOAD_SIZE));
    assert_eq!(backend.check_in_calls(), 0);
}

/// S5. The interceptor itself rejects a stream without declared size
#[test]
fn test_interceptor_rejects_missing_size_header() {
    let backend = Arc::new(FakeBackend::new());
    let interceptor = ClaimCheckStreamingProducerInterceptor::<String>::new(backend.clone(), Arc::new(StringCodec));

    let err = interceptor
        .on_send(ProducerRecord::new("t", Some(PayloadStream::from_bytes(vec![1u8; 10]))))
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::ContractViolation);
    assert_eq!(backend.check_in_calls(), 0);
}

/// S6. Streaming check-in failure is surfaced by the serializer
#[test_log::test]
fn test_streaming_backend_failure_reaches_caller() {
    let backend = Arc::new(FakeBackend::failing());
    let producer = producer(backend.clone(), 10);

    let err = producer.send(stream_record("t", "k", random_bytes(1000))).unwrap_err();

    assert!(matches!(err, ClaimCheckError::Externalization { .. }));
    assert!(err.to_string().contains(FAKE_BACKEND_FAILURE));
    assert_eq!(backend.check_in_calls(), 1);
}

/// S7. A stream shorter than its declared size is rejected
#[test_log::test]
fn test_short_stream_is_contract_violation() {
    let backend = Arc::new(FakeBackend::new());
    let producer = producer(backend, 1024);
    let mut headers = Headers::new();
    claimcheck_core::headers::set_payload_size(&mut headers, 100).unwrap();
    let record = ProducerRecord::<String, PayloadStream>::new("t", Some(PayloadStream::from_bytes(vec![0u8; 10])))
        .with_headers(headers);

    let err = producer.send(record).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ContractViolation);
}
