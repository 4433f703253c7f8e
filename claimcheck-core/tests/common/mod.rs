#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use claimcheck_core::headers::set_payload_size;
use claimcheck_core::{ClaimCheck, ClaimCheckBackend, ClaimCheckError, ClaimCheckResult, Headers, PayloadStream, ProducerRecord};

pub const FAKE_BACKEND_FAILURE: &str = "Some fake backend exception";

/// Backend double numbering its references and optionally failing every call
#[derive(Default)]
pub struct FakeBackend {
    counter: AtomicUsize,
    check_ins: AtomicUsize,
    check_outs: AtomicUsize,
    fail: AtomicBool,
    payloads: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let backend = Self::new();
        backend.set_error_mode(true);
        backend
    }

    pub fn set_error_mode(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn check_in_calls(&self) -> usize {
        self.check_ins.load(Ordering::SeqCst)
    }

    pub fn check_out_calls(&self) -> usize {
        self.check_outs.load(Ordering::SeqCst)
    }

    fn guard(&self) -> ClaimCheckResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(ClaimCheckError::backend(FAKE_BACKEND_FAILURE))
        } else {
            Ok(())
        }
    }

    fn store(&self, payload: Vec<u8>) -> ClaimCheck {
        let reference = (self.counter.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        self.payloads.lock().insert(reference.clone(), payload);
        ClaimCheck::new(reference)
    }

    fn load(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<Vec<u8>> {
        self.payloads
            .lock()
            .get(claim_check.reference())
            .cloned()
            .ok_or_else(|| ClaimCheckError::bad_reference(claim_check.reference()))
    }
}

impl ClaimCheckBackend for FakeBackend {
    fn check_in(&self, _topic: &str, payload: &[u8]) -> ClaimCheckResult<ClaimCheck> {
        self.check_ins.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        Ok(self.store(payload.to_vec()))
    }

    fn check_in_streaming(&self, _topic: &str, payload: &mut dyn Read, payload_size: u64) -> ClaimCheckResult<ClaimCheck> {
        self.check_ins.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        let mut buffer = Vec::new();
        payload.take(payload_size).read_to_end(&mut buffer)?;
        Ok(self.store(buffer))
    }

    fn check_out(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<Vec<u8>> {
        self.check_outs.fetch_add(1, Ordering::SeqCst);
        self.guard()?;
        self.load(claim_check)
    }

    fn check_out_streaming(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<PayloadStream> {
        Ok(PayloadStream::from_bytes(self.check_out(claim_check)?))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Deterministic printable payload of `length` bytes
pub fn random_string(length: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut rng = StdRng::seed_from_u64(0);
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Deterministic random bytes
pub fn random_bytes(length: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(0);
    let mut bytes = vec![0u8; length];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Streaming record with the payload-size header already declared
pub fn stream_record(topic: &str, key: &str, value: Vec<u8>) -> ProducerRecord<String, PayloadStream> {
    let mut headers = Headers::new();
    set_payload_size(&mut headers, value.len() as u64).unwrap();
    ProducerRecord::new(topic, Some(PayloadStream::from_bytes(value)))
        .with_key(key.to_string())
        .with_headers(headers)
}
