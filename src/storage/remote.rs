//! Remote object-store backend
//!
//! Uploads the encoded JPEG under `<prefix>/<name>` and picks the returned
//! URL by policy:
//! 1. signed URL when a signed-URL lifetime is configured
//! 2. otherwise public URL after marking the object public-read
//! 3. long-lived signed URL if the bucket refuses public ACLs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Location, StorageError, StoredAsset};

/// Lifetime requested when public access is refused
pub const FALLBACK_SIGNED_URL_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Object storage operations needed by the remote backend
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket name
    fn bucket(&self) -> &str;

    /// Check that the bucket exists and is reachable
    async fn bucket_exists(&self) -> Result<bool, StorageError>;

    /// Upload `data` under `key`
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    /// Grant anonymous read access to `key`
    async fn make_public(&self, key: &str) -> Result<(), StorageError>;

    /// Unsigned URL for `key`
    fn public_url(&self, key: &str) -> String;

    /// Time-limited signed GET URL for `key`
    async fn signed_url(&self, key: &str, expires: Duration) -> Result<String, StorageError>;
}

/// Remote storage backend
#[derive(Clone)]
pub struct RemoteStore {
    client: Arc<dyn ObjectStore>,
    prefix: String,
    /// `None` = try public access first
    signed_url_ttl: Option<Duration>,
}

impl RemoteStore {
    /// Create a remote backend; `signed_url_secs` of 0 disables signed URLs
    pub fn new(client: Arc<dyn ObjectStore>, prefix: &str, signed_url_secs: u64) -> Self {
        Self {
            client,
            prefix: prefix.trim_matches('/').to_string(),
            signed_url_ttl: (signed_url_secs > 0).then(|| Duration::from_secs(signed_url_secs)),
        }
    }

    /// Bucket name
    pub fn bucket(&self) -> &str {
        self.client.bucket()
    }

    /// Log whether the bucket is reachable; failures are not fatal
    pub async fn probe(&self) {
        match self.client.bucket_exists().await {
            Ok(true) => info!("Using bucket {}", self.bucket()),
            Ok(false) => warn!("Bucket {} does not exist", self.bucket()),
            Err(e) => warn!("Bucket {} not reachable: {}", self.bucket(), e),
        }
    }

    /// Object key for a generated name
    pub fn key_for(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    /// Upload encoded JPEG bytes and return the asset with its access URL
    pub async fn store(&self, jpeg: Vec<u8>, name: &str) -> Result<StoredAsset, StorageError> {
        let key = self.key_for(name);
        self.client.put_object(&key, jpeg, "image/jpeg").await?;

        let url = match self.signed_url_ttl {
            Some(ttl) => self.client.signed_url(&key, ttl).await?,
            None => match self.client.make_public(&key).await {
                Ok(()) => self.client.public_url(&key),
                Err(e) => {
                    warn!(
                        "Could not make {} public ({}), falling back to signed URL",
                        key, e
                    );
                    self.client.signed_url(&key, FALLBACK_SIGNED_URL_TTL).await?
                }
            },
        };

        debug!("Stored {} in bucket {}", key, self.bucket());
        Ok(StoredAsset {
            name: name.to_string(),
            location: Location::Remote {
                bucket: self.bucket().to_string(),
                key,
            },
            url,
        })
    }
}
