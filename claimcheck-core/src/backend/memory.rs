use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{split_reference, ClaimCheckBackend, ConfigurableBackend, ContainerCache};
use crate::config::ClaimCheckConfig;
use crate::{ClaimCheck, ClaimCheckError, ClaimCheckResult, PayloadStream};

const SCHEME: &str = "memory://";

type Container = Arc<DashMap<String, Bytes>>;

/// In-memory backend for testing and development
pub struct MemoryBackend {
    /// Per-topic handles, created on first use
    containers: ContainerCache<Container>,

    /// The "remote" side: containers that exist, by name
    store: RwLock<HashMap<String, Container>>,

    /// Container creation calls per topic
    creations: RwLock<HashMap<String, usize>>,

    create_if_missing: bool,
    closed: AtomicBool,
}

impl MemoryBackend {
    /// Backend that requires containers to be created up front
    pub fn new() -> Self {
        Self {
            containers: ContainerCache::new(),
            store: RwLock::new(HashMap::new()),
            creations: RwLock::new(HashMap::new()),
            create_if_missing: false,
            closed: AtomicBool::new(false),
        }
    }

    /// Create missing containers on first check-in
    pub fn create_containers_if_missing(mut self) -> Self {
        self.create_if_missing = true;
        self
    }

    /// Create the container for `topic` ahead of time
    pub fn create_container(&self, topic: &str) {
        self.create_remote(topic);
    }

    /// How many times a container was created for `topic`
    pub fn container_creations(&self, topic: &str) -> usize {
        self.creations.read().get(topic).copied().unwrap_or(0)
    }

    /// Number of payloads stored for `topic`
    pub fn stored_count(&self, topic: &str) -> usize {
        self.store.read().get(topic).map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn create_remote(&self, topic: &str) -> Container {
        let mut store = self.store.write();
        if let Some(existing) = store.get(topic) {
            return existing.clone();
        }

        let container: Container = Arc::new(DashMap::new());
        store.insert(topic.to_string(), container.clone());
        *self.creations.write().entry(topic.to_string()).or_insert(0) += 1;
        info!("created claim check container: topic={}", topic);
        container
    }

    fn container(&self, topic: &str) -> ClaimCheckResult<Container> {
        self.containers.get_or_try_create(topic, || {
            if let Some(existing) = self.store.read().get(topic) {
                return Ok(existing.clone());
            }
            if self.create_if_missing {
                Ok(self.create_remote(topic))
            } else {
                Err(ClaimCheckError::backend(format!("container does not exist: {topic}")))
            }
        })
    }

    fn put(&self, topic: &str, payload: Bytes) -> ClaimCheckResult<ClaimCheck> {
        let container = self.container(topic)?;
        let name = Uuid::new_v4().to_string();
        let length = payload.len();
        container.insert(name.clone(), payload);

        let claim_check = ClaimCheck::new(format!("{SCHEME}{topic}/{name}"));
        debug!("checked in claim check: topic={}, ref={}, length={}", topic, claim_check, length);
        Ok(claim_check)
    }

    fn get(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<Bytes> {
        let (topic, name) = split_reference(claim_check, SCHEME)?;
        let container = self
            .store
            .read()
            .get(topic)
            .cloned()
            .ok_or_else(|| ClaimCheckError::backend(format!("container does not exist: {topic}")))?;

        let payload = container
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ClaimCheckError::backend(format!("claim check not found: {claim_check}")))?;
        Ok(payload)
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimCheckBackend for MemoryBackend {
    fn check_in(&self, topic: &str, payload: &[u8]) -> ClaimCheckResult<ClaimCheck> {
        self.put(topic, Bytes::copy_from_slice(payload))
    }

    fn check_in_streaming(&self, topic: &str, payload: &mut dyn Read, payload_size: u64) -> ClaimCheckResult<ClaimCheck> {
        let mut buffer = Vec::new();
        let read = payload.take(payload_size).read_to_end(&mut buffer)? as u64;
        if read != payload_size {
            return Err(ClaimCheckError::contract(format!(
                "stream ended after {read} of the declared {payload_size} bytes"
            )));
        }
        self.put(topic, Bytes::from(buffer))
    }

    fn check_out(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<Vec<u8>> {
        Ok(self.get(claim_check)?.to_vec())
    }

    fn check_out_streaming(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<PayloadStream> {
        Ok(PayloadStream::new(Cursor::new(self.get(claim_check)?)))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.containers.clear();
            info!("closed claim check backend: {}", self.name());
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl ConfigurableBackend for MemoryBackend {
    fn configure(config: &ClaimCheckConfig) -> ClaimCheckResult<Self> {
        let backend = Self::new();
        Ok(if config.create_container_if_missing {
            backend.create_containers_if_missing()
        } else {
            backend
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_in_and_out() {
        let backend = MemoryBackend::new().create_containers_if_missing();

        let claim_check = backend.check_in("orders", b"big payload").unwrap();

        assert!(claim_check.reference().starts_with("memory://orders/"));
        assert_eq!(backend.check_out(&claim_check).unwrap(), b"big payload");
        assert_eq!(backend.stored_count("orders"), 1);
    }

    #[test]
    fn test_missing_container_without_create_policy() {
        let backend = MemoryBackend::new();

        let err = backend.check_in("orders", b"x").unwrap_err();
        assert!(err.to_string().contains("container does not exist"));

        backend.create_container("orders");
        assert!(backend.check_in("orders", b"x").is_ok());
        assert_eq!(backend.container_creations("orders"), 1);
    }

    #[test]
    fn test_streaming_reads_declared_size() {
        let backend = MemoryBackend::new().create_containers_if_missing();
        let mut source = Cursor::new(b"0123456789".to_vec());

        let claim_check = backend.check_in_streaming("t", &mut source, 4).unwrap();
        let stream = backend.check_out_streaming(&claim_check).unwrap();

        assert_eq!(stream.read_to_end_vec().unwrap(), b"0123");
    }

    #[test]
    fn test_unknown_reference() {
        let backend = MemoryBackend::new().create_containers_if_missing();
        backend.check_in("t", b"x").unwrap();

        let err = backend.check_out(&ClaimCheck::new("file://t/abc")).unwrap_err();
        assert!(err.is_bad_reference());

        let err = backend.check_out(&ClaimCheck::new("memory://t/missing")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = MemoryBackend::new();
        backend.close();
        backend.close();

        assert!(backend.is_closed());
    }
}
