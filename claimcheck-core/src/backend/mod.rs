pub mod cache;
pub mod filesystem;
pub mod memory;

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use crate::config::{BackendKind, ClaimCheckConfig};
use crate::{ClaimCheck, ClaimCheckError, ClaimCheckResult, PayloadStream};

pub use cache::ContainerCache;
pub use filesystem::FileSystemBackend;
pub use memory::MemoryBackend;

/// Storage for externalized payloads.
///
/// Every call may block on I/O. Implementations keep their per-topic
/// container handles in a [`ContainerCache`] so concurrent first use of a
/// topic creates its container once.
pub trait ClaimCheckBackend: Send + Sync {
    /// Store a payload and return its reference
    fn check_in(&self, topic: &str, payload: &[u8]) -> ClaimCheckResult<ClaimCheck>;

    /// Store `payload_size` bytes read from `payload`
    fn check_in_streaming(&self, topic: &str, payload: &mut dyn Read, payload_size: u64) -> ClaimCheckResult<ClaimCheck>;

    /// Fetch a whole payload
    fn check_out(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<Vec<u8>>;

    /// Fetch a payload as a stream
    fn check_out_streaming(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<PayloadStream>;

    /// Release resources; safe to call more than once
    fn close(&self) {}

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Backends that can be built from configuration
pub trait ConfigurableBackend: ClaimCheckBackend + Sized + 'static {
    /// One-time setup; invalid settings are config failures
    fn configure(config: &ClaimCheckConfig) -> ClaimCheckResult<Self>;
}

type BackendFactory = Arc<dyn Fn(&ClaimCheckConfig) -> ClaimCheckResult<Arc<dyn ClaimCheckBackend>> + Send + Sync>;

/// Backend factories keyed by [`BackendKind`]
#[derive(Clone)]
pub struct BackendRegistry {
    factories: HashMap<BackendKind, BackendFactory>,
}

impl BackendRegistry {
    /// Registry with the memory and filesystem backends
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry
            .register_configurable::<MemoryBackend>(BackendKind::Memory)
            .register_configurable::<FileSystemBackend>(BackendKind::FileSystem);
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory, replacing any existing one for `kind`
    pub fn register<F>(&mut self, kind: BackendKind, factory: F) -> &mut Self
    where
        F: Fn(&ClaimCheckConfig) -> ClaimCheckResult<Arc<dyn ClaimCheckBackend>> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Arc::new(factory));
        self
    }

    pub fn register_configurable<B: ConfigurableBackend>(&mut self, kind: BackendKind) -> &mut Self {
        self.register(kind, |config| {
            let backend: Arc<dyn ClaimCheckBackend> = Arc::new(B::configure(config)?);
            Ok(backend)
        })
    }

    /// Always hand out the same instance, e.g. to share one store between a
    /// producer and a consumer
    pub fn register_instance(&mut self, kind: BackendKind, backend: Arc<dyn ClaimCheckBackend>) -> &mut Self {
        self.register(kind, move |_| Ok(backend.clone()))
    }

    pub fn is_registered(&self, kind: BackendKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Build the backend selected by `claimcheck.backend`
    pub fn create(&self, config: &ClaimCheckConfig) -> ClaimCheckResult<Arc<dyn ClaimCheckBackend>> {
        let kind = config.require_backend()?;
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| ClaimCheckError::config(format!("Claim check backend not registered: {kind}")))?;
        factory(config)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `scheme://container/name` into its container and name.
/// Anything else is a bad reference.
pub fn split_reference<'a>(claim_check: &'a ClaimCheck, scheme: &str) -> ClaimCheckResult<(&'a str, &'a str)> {
    let reference = claim_check.reference();
    reference
        .strip_prefix(scheme)
        .and_then(|rest| rest.split_once('/'))
        .filter(|(container, name)| !container.is_empty() && !name.is_empty() && !name.contains('/'))
        .ok_or_else(|| ClaimCheckError::bad_reference(reference))
}
