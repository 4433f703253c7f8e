use std::future::Future;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};

use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use tokio::runtime::Runtime;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, info, warn};
use uuid::Uuid;

use claimcheck_core::backend::split_reference;
use claimcheck_core::{
    ClaimCheck, ClaimCheckBackend, ClaimCheckConfig, ClaimCheckError, ClaimCheckResult, ConfigurableBackend,
    ContainerCache, PayloadStream,
};

use crate::config::{S3Credentials, S3Settings};

const SCHEME: &str = "s3://";

/// Claim check backend storing one object per payload, one bucket per topic
pub struct S3Backend {
    client: Client,
    settings: S3Settings,
    buckets: ContainerCache<String>,
    runtime: Runtime,
    closed: AtomicBool,
}

impl S3Backend {
    pub fn new(settings: S3Settings) -> ClaimCheckResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("claimcheck-s3")
            .enable_all()
            .build()?;
        let client = runtime.block_on(create_client(&settings))?;

        info!(
            "created S3 claim check backend: region={}, endpoint={}",
            settings.region,
            settings.endpoint.as_deref().unwrap_or("default")
        );
        Ok(Self {
            client,
            settings,
            buckets: ContainerCache::new(),
            runtime,
            closed: AtomicBool::new(false),
        })
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Bucket for `topic`, verified or created once per backend
    fn bucket(&self, topic: &str) -> ClaimCheckResult<String> {
        let bucket = self.settings.bucket_for(topic);
        self.buckets.get_or_try_create(topic, || {
            self.block_on(self.ensure_bucket(&bucket))?;
            Ok(bucket.clone())
        })
    }

    async fn ensure_bucket(&self, bucket: &str) -> ClaimCheckResult<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => return Ok(()),
            Err(e) => {
                let missing = e.as_service_error().map(|se| se.is_not_found()).unwrap_or(false);
                if !missing {
                    return Err(ClaimCheckError::backend_source(format!("could not check bucket {bucket}"), e));
                }
            }
        }

        if !self.settings.create_bucket_if_missing {
            return Err(ClaimCheckError::backend(format!("container does not exist: {bucket}")));
        }

        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint
        if self.settings.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.settings.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                info!("created claim check container: bucket={}", bucket);
                Ok(())
            }
            // another client won the race
            Err(e)
                if e.as_service_error()
                    .map(|se| se.is_bucket_already_owned_by_you())
                    .unwrap_or(false) =>
            {
                Ok(())
            }
            Err(e) => Err(ClaimCheckError::backend_source(format!("could not create bucket {bucket}"), e)),
        }
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> ClaimCheckResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| ClaimCheckError::backend_source(format!("could not upload {SCHEME}{bucket}/{key}"), e))?;
        Ok(())
    }

    fn multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        payload: &mut dyn Read,
        payload_size: u64,
    ) -> ClaimCheckResult<()> {
        let created = self
            .block_on(self.client.create_multipart_upload().bucket(bucket).key(key).send())
            .map_err(|e| ClaimCheckError::backend_source(format!("could not start upload of {SCHEME}{bucket}/{key}"), e))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| ClaimCheckError::backend("multipart upload started without an upload id"))?
            .to_string();

        match self.upload_parts(bucket, key, &upload_id, payload, payload_size) {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder().set_parts(Some(parts)).build();
                self.block_on(
                    self.client
                        .complete_multipart_upload()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(&upload_id)
                        .multipart_upload(completed)
                        .send(),
                )
                .map_err(|e| {
                    ClaimCheckError::backend_source(format!("could not complete upload of {SCHEME}{bucket}/{key}"), e)
                })?;
                Ok(())
            }
            Err(e) => {
                let aborted = self.block_on(
                    self.client
                        .abort_multipart_upload()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(&upload_id)
                        .send(),
                );
                if let Err(abort) = aborted {
                    warn!("could not abort multipart upload: bucket={}, key={}, error={}", bucket, key, abort);
                }
                Err(e)
            }
        }
    }

    /// Read and upload one part at a time so memory stays bounded by the part size
    fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        payload: &mut dyn Read,
        payload_size: u64,
    ) -> ClaimCheckResult<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut remaining = payload_size;
        let mut part_number = 1;

        while remaining > 0 {
            let length = remaining.min(self.settings.part_size);
            let buffer = read_part(payload, length, payload_size - remaining)?;

            let uploaded = self
                .block_on(
                    self.client
                        .upload_part()
                        .bucket(bucket)
                        .key(key)
                        .upload_id(upload_id)
                        .part_number(part_number)
                        .body(ByteStream::from(buffer))
                        .send(),
                )
                .map_err(|e| ClaimCheckError::backend_source(format!("could not upload part {part_number}"), e))?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(uploaded.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            remaining -= length;
            part_number += 1;
        }
        Ok(parts)
    }

    fn locate<'a>(&self, claim_check: &'a ClaimCheck) -> ClaimCheckResult<(&'a str, &'a str)> {
        split_reference(claim_check, SCHEME)
    }

    fn get_object(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<ByteStream> {
        let (bucket, key) = self.locate(claim_check)?;
        let output = self
            .block_on(self.client.get_object().bucket(bucket).key(key).send())
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_no_such_key()).unwrap_or(false) {
                    ClaimCheckError::backend(format!("claim check not found: {claim_check}"))
                } else {
                    ClaimCheckError::backend_source(format!("could not download {claim_check}"), e)
                }
            })?;
        Ok(output.body)
    }
}

/// Read exactly `length` bytes of the next part
fn read_part(payload: &mut dyn Read, length: u64, offset: u64) -> ClaimCheckResult<Vec<u8>> {
    // bounded by the configured part size
    let capacity = usize::try_from(length).map_err(|_| ClaimCheckError::contract("part too large for memory"))?;
    let mut buffer = Vec::with_capacity(capacity);
    let read = payload.take(length).read_to_end(&mut buffer)? as u64;
    if read != length {
        return Err(ClaimCheckError::contract(format!(
            "stream ended after {} bytes, before the declared payload size",
            offset + read
        )));
    }
    Ok(buffer)
}

async fn create_client(settings: &S3Settings) -> ClaimCheckResult<Client> {
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));

    if let S3Credentials::Static {
        access_key_id,
        secret_access_key,
    } = &settings.credentials
    {
        let credentials = Credentials::new(access_key_id.clone(), secret_access_key.resolve()?, None, None, "claimcheck");
        loader = loader.credentials_provider(credentials);
    }
    if let Some(endpoint) = &settings.endpoint {
        loader = loader.endpoint_url(endpoint.clone());
    }

    let aws_config = loader.load().await;
    Ok(Client::from_conf(
        aws_sdk_s3::config::Builder::from(&aws_config)
            .force_path_style(settings.force_path_style)
            .build(),
    ))
}

impl ClaimCheckBackend for S3Backend {
    fn check_in(&self, topic: &str, payload: &[u8]) -> ClaimCheckResult<ClaimCheck> {
        let bucket = self.bucket(topic)?;
        let key = Uuid::new_v4().to_string();

        self.block_on(self.put(&bucket, &key, payload.to_vec()))?;

        let claim_check = ClaimCheck::new(format!("{SCHEME}{bucket}/{key}"));
        debug!("checked in claim check: topic={}, ref={}, length={}", topic, claim_check, payload.len());
        Ok(claim_check)
    }

    fn check_in_streaming(&self, topic: &str, payload: &mut dyn Read, payload_size: u64) -> ClaimCheckResult<ClaimCheck> {
        let bucket = self.bucket(topic)?;
        let key = Uuid::new_v4().to_string();

        if payload_size <= self.settings.part_size {
            let buffer = read_part(payload, payload_size, 0)?;
            self.block_on(self.put(&bucket, &key, buffer))?;
        } else {
            self.multipart_upload(&bucket, &key, payload, payload_size)?;
        }

        let claim_check = ClaimCheck::new(format!("{SCHEME}{bucket}/{key}"));
        debug!("checked in claim check: topic={}, ref={}, length={}", topic, claim_check, payload_size);
        Ok(claim_check)
    }

    fn check_out(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<Vec<u8>> {
        let body = self.get_object(claim_check)?;
        let bytes = self
            .block_on(body.collect())
            .map_err(|e| ClaimCheckError::backend_source(format!("could not read {claim_check}"), e))?;
        Ok(bytes.into_bytes().to_vec())
    }

    fn check_out_streaming(&self, claim_check: &ClaimCheck) -> ClaimCheckResult<PayloadStream> {
        let body = self.get_object(claim_check)?;
        let reader = SyncIoBridge::new_with_handle(Box::pin(body.into_async_read()), self.runtime.handle().clone());
        Ok(PayloadStream::new(reader))
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.buckets.clear();
            info!("closed claim check backend: {}", self.name());
        }
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}

impl ConfigurableBackend for S3Backend {
    fn configure(config: &ClaimCheckConfig) -> ClaimCheckResult<Self> {
        Self::new(S3Settings::from_config(config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_part_exact() {
        let mut source = std::io::Cursor::new(vec![1u8; 10]);

        assert_eq!(read_part(&mut source, 4, 0).unwrap(), vec![1u8; 4]);
        assert_eq!(read_part(&mut source, 6, 4).unwrap(), vec![1u8; 6]);
    }

    #[test]
    fn test_read_part_short_stream() {
        let mut source = std::io::Cursor::new(vec![1u8; 3]);

        let err = read_part(&mut source, 4, 100).unwrap_err();

        assert_eq!(err.kind(), claimcheck_core::ErrorKind::ContractViolation);
        assert!(err.to_string().contains("103"));
    }
}
