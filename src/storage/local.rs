//! Local filesystem backend
//!
//! Writes JPEGs into the output directory. The URL is the public base joined
//! with the file name; the HTTP layer serves the directory under that base
//! when it is a path.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{Location, StorageError, StoredAsset};

/// Local storage backend
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
    public_base: String,
}

impl LocalStore {
    /// Create the backend, creating `dir` if needed
    pub async fn new(dir: &Path, public_base: &str) -> Result<Self, StorageError> {
        fs::create_dir_all(dir).await?;
        info!("Storing processed images in {}", dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            public_base: public_base.trim_end_matches('/').to_string(),
        })
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// URL prefix for stored files
    pub fn public_base(&self) -> &str {
        &self.public_base
    }

    /// URL of a stored file
    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.public_base, name.trim_start_matches('/'))
    }

    /// Write encoded JPEG bytes under `name`
    ///
    /// Fails rather than overwriting an existing file.
    pub async fn store(&self, jpeg: Vec<u8>, name: &str) -> Result<StoredAsset, StorageError> {
        let path = self.dir.join(name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(&jpeg).await?;
        file.flush().await?;

        debug!("Wrote {} ({} bytes)", path.display(), jpeg.len());
        Ok(StoredAsset {
            name: name.to_string(),
            url: self.url_for(name),
            location: Location::Local(path),
        })
    }
}
