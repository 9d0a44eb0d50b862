//! S3 object-store implementation

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::RetryConfig;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, MetadataDirective};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chunkgate_core::StoreConfig;

use crate::traits::{ObjectStore, StorageError, StorageResult, UploadedPart};

/// S3 (or S3-compatible) object store.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new S3ObjectStore instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `credentials` - Optional explicit access key pair; the default
    ///   provider chain is used when absent
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        credentials: Option<(String, String)>,
    ) -> StorageResult<Self> {
        let region_provider =
            RegionProviderChain::first_try(aws_config::Region::new(region));

        // Store calls are not retried; a failed part fails the upload.
        let retry_config = RetryConfig::disabled();

        let mut config_builder = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone());

        if let Some((access_key_id, secret_access_key)) = credentials {
            config_builder = config_builder.credentials_provider(Credentials::new(
                access_key_id,
                secret_access_key,
                None,
                None,
                "chunkgate",
            ));
        }

        let config = config_builder.load().await;

        // Configure the client with a custom endpoint if provided. S3-compatible
        // providers need path-style addressing.
        let client = if let Some(ref endpoint) = endpoint_url {
            let mut s3_config_builder = aws_sdk_s3::Config::builder()
                .endpoint_url(endpoint)
                .region(config.region().cloned())
                .retry_config(retry_config);
            if let Some(provider) = config.credentials_provider().into_iter().next() {
                s3_config_builder = s3_config_builder.credentials_provider(provider);
            }
            s3_config_builder = s3_config_builder.force_path_style(true);

            Client::from_conf(s3_config_builder.build())
        } else {
            Client::new(&config)
        };

        Ok(S3ObjectStore { client, bucket })
    }

    /// Build from the application configuration, failing fast on missing
    /// required store settings.
    pub async fn from_config(config: &StoreConfig) -> StorageResult<Self> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| StorageError::BackendError("S3_BUCKET is not configured".into()))?;
        let region = config
            .region
            .clone()
            .ok_or_else(|| StorageError::BackendError("S3_REGION is not configured".into()))?;
        let credentials = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => {
                Some((access_key_id.clone(), secret_access_key.clone()))
            }
            _ => None,
        };

        Self::new(bucket, region, config.endpoint.clone(), credentials).await
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let result = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to create multipart upload"
                );
                StorageError::CreateFailed(e.to_string())
            })?;

        result
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| StorageError::CreateFailed("no upload ID returned".into()))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String> {
        let start = std::time::Instant::now();
        let size = body.len() as u64;

        let result = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    part_number,
                    "Failed to upload part"
                );
                StorageError::PartUploadFailed(e.to_string())
            })?;

        let e_tag = result
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| {
                StorageError::PartUploadFailed(format!("no ETag returned for part {}", part_number))
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            part_number,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Part upload successful"
        );

        Ok(e_tag)
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()> {
        let completed_parts: Vec<CompletedPart> = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(&part.e_tag)
                    .build()
            })
            .collect();

        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to complete multipart upload"
                );
                StorageError::CompleteFailed(e.to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            parts = parts.len(),
            "Multipart upload completed"
        );

        Ok(())
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to abort multipart upload"
                );
                StorageError::AbortFailed(e.to_string())
            })?;

        tracing::warn!(bucket = %self.bucket, key = %key, "Multipart upload aborted");

        Ok(())
    }

    async fn copy_object(
        &self,
        from_key: &str,
        to_key: &str,
        content_type: &str,
        metadata: Option<&HashMap<String, String>>,
    ) -> StorageResult<()> {
        // URL-encode the copy source per AWS S3 API requirements
        let encoded_key = urlencoding::encode(from_key);
        let copy_source = format!("{}/{}", self.bucket, encoded_key);

        let mut request = self
            .client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(&copy_source)
            .key(to_key)
            .content_type(content_type);

        if let Some(metadata) = metadata {
            request = request
                .set_metadata(Some(metadata.clone()))
                .metadata_directive(MetadataDirective::Replace);
        }

        request.send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                from_key = %from_key,
                to_key = %to_key,
                "Failed to copy object"
            );
            StorageError::CopyFailed(e.to_string())
        })?;

        tracing::info!(
            from_key = %from_key,
            to_key = %to_key,
            "Copy successful"
        );

        Ok(())
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to delete object"
                );
                StorageError::DeleteFailed(e.to_string())
            })?;

        Ok(())
    }
}
