use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{split_reference, ClaimCheckBackend, ConfigurableBackend, ContainerCache};
use crate::config::{keys, ClaimCheckConfig};
use crate::{ClaimCheck, ClaimCheckError, ClaimCheckResult, PayloadStream};

const SCHEME: &str = "file://";

/// Stores payloads as files, one directory per topic
pub struct FileSystemBackend {
    root: PathBuf,
    containers: ContainerCache<PathBuf>,
    create_if_missing: bool,
    closed: AtomicBool,
}

impl FileSystemBackend {
    /// Backend rooted at an existing directory
    pub fn new<P: Into<PathBuf>>(root: P) -> ClaimCheckResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ClaimCheckError::config(format!(
                "Claim check root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root,
            containers: ContainerCache::new(),
            create_if_missing: false,
            closed: AtomicBool::new(false),
        })
    }

    pub fn create_containers_if_missing(mut self) -> Self {
        self.create_if_missing = true;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container(&self, topic: &str) -> ClaimCheckResult<PathBuf> {
        validate_segment(topic).map_err(ClaimCheckError::contract)?;

        self.containers.get_or_try_create(topic, || {
            let dir = self.root.join(topic);
            if dir.is_dir() {
                return Ok(dir);
            }
            if !self.create_if_missing {
                return Err(ClaimCheckError::backend(format!("container does not exist: {topic}")));
            }
            fs::create_dir_all(&dir)
                .map_err(|e| ClaimCheckError::backend_source(format!("could not create container {topic}"), e))?;
            info!("created claim check container: topic={}, path={}", topic, dir.display());
            Ok(dir)
        })
    }

    fn blob_path(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<PathBuf> {
        let (topic, name) = split_reference(claim_check, SCHEME)?;
        if validate_segment(topic).is_err() || validate_segment(name).is_err() {
            return Err(ClaimCheckError::bad_reference(claim_check.reference()));
        }
        Ok(self.root.join(topic).join(name))
    }

    fn open(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<File> {
        let path = self.blob_path(claim_check)?;
        File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ClaimCheckError::backend(format!("claim check not found: {claim_check}")),
            _ => ClaimCheckError::backend_source(format!("could not open {}", path.display()), e),
        })
    }

    fn write_blob<F>(&self, topic: &str, write: F) -> ClaimCheckResult<ClaimCheck>
    where
        F: FnOnce(&mut BufWriter<File>) -> ClaimCheckResult<u64>,
    {
        let dir = self.container(topic)?;
        let name = Uuid::new_v4().to_string();
        let path = dir.join(&name);

        let file = File::create(&path)
            .map_err(|e| ClaimCheckError::backend_source(format!("could not create {}", path.display()), e))?;
        let mut writer = BufWriter::new(file);
        let written = match write(&mut writer).and_then(|n| writer.flush().map(|_| n).map_err(Into::into)) {
            Ok(n) => n,
            Err(e) => {
                drop(writer);
                let _ = fs::remove_file(&path);
                return Err(e);
            }
        };

        let claim_check = ClaimCheck::new(format!("{SCHEME}{topic}/{name}"));
        debug!("checked in claim check: topic={}, ref={}, length={}", topic, claim_check, written);
        Ok(claim_check)
    }
}

/// A topic or blob name must stay a single path component below the root
fn validate_segment(segment: &str) -> Result<(), String> {
    let valid = !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(format!("invalid container or blob name: {segment:?}"))
    }
}

impl ClaimCheckBackend for FileSystemBackend {
    fn check_in(&self, topic: &str, payload: &[u8]) -> ClaimCheckResult<ClaimCheck> {
        self.write_blob(topic, |writer| {
            writer.write_all(payload)?;
            Ok(payload.len() as u64)
        })
    }

    fn check_in_streaming(&self, topic: &str, payload: &mut dyn Read, payload_size: u64) -> ClaimCheckResult<ClaimCheck> {
        self.write_blob(topic, |writer| {
            let copied = io::copy(&mut payload.take(payload_size), writer)?;
            if copied != payload_size {
                return Err(ClaimCheckError::contract(format!(
                    "stream ended after {copied} of the declared {payload_size} bytes"
                )));
            }
            Ok(copied)
        })
    }

    fn check_out(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.open(claim_check)?.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn check_out_streaming(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<PayloadStream> {
        Ok(PayloadStream::new(BufReader::new(self.open(claim_check)?)))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.containers.clear();
            info!("closed claim check backend: {}", self.name());
        }
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

impl ConfigurableBackend for FileSystemBackend {
    fn configure(config: &ClaimCheckConfig) -> ClaimCheckResult<Self> {
        let root = config.options.require(keys::FILESYSTEM_ROOT)?;
        let backend = Self::new(root)?;
        Ok(if config.create_container_if_missing {
            backend.create_containers_if_missing()
        } else {
            backend
        })
    }
}
