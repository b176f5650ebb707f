//! S3-compatible object store client
//!
//! Thin wrapper over `aws-sdk-s3` bound to one bucket. Works with AWS S3 and
//! compatible stores (MinIO, R2, GCS interoperability mode).

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tracing::{debug, warn};
use url::Url;

use super::remote::ObjectStore;
use super::StorageError;

/// Longest expiry SigV4 presigned URLs accept (7 days)
pub const MAX_PRESIGN_SECS: u64 = 7 * 24 * 60 * 60;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// S3 client bound to a single bucket
#[derive(Debug, Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
    /// Endpoint without bucket, e.g. `https://s3.us-east-1.amazonaws.com`
    endpoint: Url,
    /// `endpoint/bucket/key` instead of `bucket.endpoint/key`
    path_style: bool,
}

impl S3Client {
    /// Create a client for `bucket`
    pub fn new(
        bucket: &str,
        endpoint: Option<&str>,
        region: &str,
        path_style: bool,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let endpoint_str = match endpoint {
            Some(e) => e.to_string(),
            None => format!("https://s3.{}.amazonaws.com", region),
        };
        let endpoint_url = Url::parse(&endpoint_str).map_err(|e| {
            StorageError::Config(format!("invalid endpoint {}: {}", endpoint_str, e))
        })?;
        if endpoint_url.host_str().is_none() {
            return Err(StorageError::Config(format!(
                "endpoint has no host: {}",
                endpoint_str
            )));
        }

        let credentials = Credentials::new(access_key, secret_key, None, None, "bgremd");
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .force_path_style(path_style)
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(REQUEST_TIMEOUT)
                    .build(),
            );
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            endpoint: endpoint_url,
            path_style,
        })
    }
}

/// Turn an SDK failure into a storage error, keeping the HTTP status if any
fn request_error<E>(context: String, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: std::error::Error + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    warn!("Object store error: {} - {}", context, DisplayErrorContext(&err));
    match status {
        Some(status) => StorageError::Status { status, context },
        None => StorageError::Upload(format!("{}: {}", context, DisplayErrorContext(&err))),
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool, StorageError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match request_error(format!("HEAD {}", self.bucket), e) {
                StorageError::Status { status: 404, .. } => Ok(false),
                e => Err(e),
            },
        }
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let len = data.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| request_error(format!("PUT {}", key), e))?;
        debug!("Uploaded {} ({} bytes) to bucket {}", key, len, self.bucket);
        Ok(())
    }

    async fn make_public(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| request_error(format!("PUT {}?acl", key), e))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        let mut url = self.endpoint.clone();
        if !self.path_style {
            if let Some(host) = self.endpoint.host_str() {
                let bucket_host = format!("{}.{}", self.bucket, host);
                if url.set_host(Some(&bucket_host)).is_err() {
                    warn!("Cannot address bucket {} by host", self.bucket);
                }
            }
        }
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            if self.path_style {
                segments.push(&self.bucket);
            }
            segments.extend(key.split('/'));
        }
        url.to_string()
    }

    async fn signed_url(&self, key: &str, expires: Duration) -> Result<String, StorageError> {
        if expires.is_zero() {
            return Err(StorageError::Sign("expiry must be positive".to_string()));
        }
        let max = Duration::from_secs(MAX_PRESIGN_SECS);
        let expires = if expires > max {
            debug!(
                "Clamping signed URL expiry from {}s to {}s",
                expires.as_secs(),
                MAX_PRESIGN_SECS
            );
            max
        } else {
            expires
        };

        let presigning =
            PresigningConfig::expires_in(expires).map_err(|e| StorageError::Sign(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Sign(DisplayErrorContext(&e).to_string()))?;
        Ok(request.uri().to_string())
    }
}
