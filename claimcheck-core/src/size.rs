//! Wire-size estimation for the externalization threshold.
//!
//! The default estimator reproduces the size of a single record wrapped in
//! an uncompressed v2 record batch: a fixed batch header, then the record
//! body with zigzag varint length prefixes for the record, key, value and
//! each header.

use crate::Headers;

/// Fixed size of a v2 record batch header
pub const RECORD_BATCH_OVERHEAD: u64 = 61;

/// Computes the framed size a record would occupy on the wire.
///
/// Only lengths matter for framing, so the value is passed as a length;
/// this lets streaming callers use a declared size without buffering.
pub trait SizeEstimator: Send + Sync {
    fn estimate(&self, key: Option<&[u8]>, value_len: Option<u64>, headers: &Headers, timestamp: i64) -> u64;
}

/// Single-record uncompressed batch size
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordBatchSizeEstimator;

impl SizeEstimator for RecordBatchSizeEstimator {
    fn estimate(&self, key: Option<&[u8]>, value_len: Option<u64>, headers: &Headers, _timestamp: i64) -> u64 {
        let record = record_size(key.map(|k| k.len() as u64), value_len, headers);
        RECORD_BATCH_OVERHEAD + record
    }
}

/// Size of one record including its own length prefix.
/// Timestamp and offset deltas are zero for the first record of a batch.
pub fn record_size(key_len: Option<u64>, value_len: Option<u64>, headers: &Headers) -> u64 {
    let attributes = 1;
    let timestamp_delta = size_of_varint(0);
    let offset_delta = size_of_varint(0);

    let mut body = attributes + timestamp_delta + offset_delta;
    body += size_of_nullable_bytes(key_len);
    body += size_of_nullable_bytes(value_len);
    body += size_of_varint(headers.len() as u64);
    for header in headers {
        let key_len = header.key.len() as u64;
        body += size_of_varint(key_len) + key_len;
        body += size_of_nullable_bytes(Some(header.value.len() as u64));
    }

    size_of_varint(body) + body
}

/// Null is encoded as a single -1 varint
fn size_of_nullable_bytes(len: Option<u64>) -> u64 {
    match len {
        Some(len) => size_of_varint(len) + len,
        None => 1,
    }
}

/// Bytes needed to zigzag-varint encode a non-negative value
pub fn size_of_varint(value: u64) -> u64 {
    // zigzag of a non-negative value is value * 2
    let mut zigzag = (value as u128) << 1;
    let mut bytes = 1;
    while zigzag >= 0x80 {
        zigzag >>= 7;
        bytes += 1;
    }
    bytes
}
