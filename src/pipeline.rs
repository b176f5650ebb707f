//! Background removal pipeline
//!
//! decode → segment → flatten onto white → store

use image::RgbImage;
use tracing::{debug, info};

use crate::error::ProcessError;
use crate::flatten::{decode_upload, flatten_dynamic};
use crate::segment::Segmenter;
use crate::storage::{naming, StorageBackend, StoredAsset};

/// An uploaded file
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Run an upload through the full pipeline and persist the result
pub async fn process_upload(
    segmenter: &dyn Segmenter,
    storage: &StorageBackend,
    upload: UploadedImage,
) -> Result<StoredAsset, ProcessError> {
    let UploadedImage { filename, data } = upload;
    let name = naming::generate_name(&filename);
    info!("Processing {} ({} bytes) as {}", filename, data.len(), name);

    let image = blocking(move || decode_upload(&data)).await?;
    debug!(
        "Decoded {}x{} {:?}",
        image.width(),
        image.height(),
        image.color()
    );

    let cutout = segmenter.remove_background(&image).await?;
    debug!("Background removed with model {}", segmenter.model());

    let flattened: RgbImage = blocking(move || flatten_dynamic(cutout)).await?;

    let asset = storage.store(flattened, &name).await?;
    info!("Stored {} via {} backend", asset.name, storage.kind());
    Ok(asset)
}

async fn blocking<T, F>(f: F) -> Result<T, ProcessError>
where
    F: FnOnce() -> Result<T, ProcessError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ProcessError::InvalidImage(format!("image worker failed: {}", e)))?
}
