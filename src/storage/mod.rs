//! Processed image storage
//!
//! Provides:
//! - JPEG encoding of flattened images
//! - Local filesystem backend with static URLs
//! - Remote object-store backend with public or signed URLs
//! - Unique output naming
//!
//! The backend is chosen once at startup from configuration.

mod local;
pub mod naming;
mod remote;
mod s3;

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use thiserror::Error;
use tracing::info;

use crate::config::Config;

pub use local::LocalStore;
pub use remote::{ObjectStore, RemoteStore, FALLBACK_SIGNED_URL_TTL};
pub use s3::S3Client;

/// JPEG quality for stored images
pub const JPEG_QUALITY: u8 = 95;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not encode JPEG: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("{context} returned {status}")]
    Status { status: u16, context: String },

    #[error("could not sign URL: {0}")]
    Sign(String),

    #[error("storage misconfigured: {0}")]
    Config(String),
}

/// Where a stored asset lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote { bucket: String, key: String },
}

/// A persisted image and the URL it is reachable at
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub name: String,
    pub location: Location,
    pub url: String,
}

/// Storage backend selected at startup
#[derive(Clone)]
pub enum StorageBackend {
    Local(LocalStore),
    Remote(RemoteStore),
}

impl StorageBackend {
    /// Build the backend described by `config`
    ///
    /// A configured bucket selects the remote backend; otherwise images go to
    /// the local output directory.
    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        let Some(bucket) = config.bucket() else {
            let local = LocalStore::new(&config.output_dir, &config.public_base).await?;
            return Ok(StorageBackend::Local(local));
        };

        let (access_key, secret_key) = match (&config.s3_access_key, &config.s3_secret_key) {
            (Some(access_key), Some(secret_key)) => (access_key, secret_key),
            _ => {
                return Err(StorageError::Config(
                    "bucket is set but AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY are missing"
                        .to_string(),
                ))
            }
        };

        let client = S3Client::new(
            bucket,
            config.s3_endpoint.as_deref(),
            &config.s3_region,
            config.s3_path_style,
            access_key,
            secret_key,
        )?;
        let remote = RemoteStore::new(
            Arc::new(client),
            &config.bucket_prefix,
            config.signed_url_seconds,
        );
        remote.probe().await;
        info!(
            "Using remote storage (bucket {}, signed URLs {})",
            bucket,
            if config.signed_url_seconds > 0 {
                format!("{}s", config.signed_url_seconds)
            } else {
                "off".to_string()
            }
        );

        Ok(StorageBackend::Remote(remote))
    }

    /// Short backend label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            StorageBackend::Local(_) => "local",
            StorageBackend::Remote(_) => "remote",
        }
    }

    /// Local backend, if selected
    pub fn local(&self) -> Option<&LocalStore> {
        match self {
            StorageBackend::Local(local) => Some(local),
            StorageBackend::Remote(_) => None,
        }
    }

    /// Encode and persist a flattened image under `name`
    pub async fn store(&self, image: RgbImage, name: &str) -> Result<StoredAsset, StorageError> {
        let jpeg = tokio::task::spawn_blocking(move || encode_jpeg(&image, JPEG_QUALITY))
            .await
            .map_err(|e| StorageError::Encode(e.to_string()))??;

        match self {
            StorageBackend::Local(local) => local.store(jpeg, name).await,
            StorageBackend::Remote(remote) => remote.store(jpeg, name).await,
        }
    }
}

/// Encode an RGB image as JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, StorageError> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(image)
        .map_err(|e| StorageError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}
