//! Background removal endpoint
//!
//! POST /remove-bg - multipart upload in field `image`

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::{header, HeaderMap},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{error, warn};

use super::AppState;
use crate::error::ProcessError;
use crate::pipeline::{process_upload, UploadedImage};

/// Build the remove-bg router
pub fn router() -> Router<AppState> {
    Router::new().route("/remove-bg", post(remove_bg))
}

/// Successful response
#[derive(Debug, Serialize)]
pub struct RemoveBgResponse {
    pub image_url: String,
}

/// Remove the background of an uploaded image
async fn remove_bg(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RemoveBgResponse>, ProcessError> {
    let Ok(multipart) = multipart else {
        warn!("Request is not multipart/form-data");
        return Err(ProcessError::no_image());
    };

    let upload = read_image_field(multipart).await?;

    let asset = process_upload(state.segmenter.as_ref(), &state.storage, upload)
        .await
        .inspect_err(|e| error!("Background removal failed: {}", e))?;

    Ok(Json(RemoveBgResponse {
        image_url: absolute_url(&asset.url, &headers),
    }))
}

/// Pull the `image` field out of the form
async fn read_image_field(mut multipart: Multipart) -> Result<UploadedImage, ProcessError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.is_empty() {
            warn!("Upload has an empty filename");
            return Err(ProcessError::no_image());
        }

        let data = field.bytes().await?;
        return Ok(UploadedImage {
            filename,
            data: data.to_vec(),
        });
    }

    warn!("No image field in request");
    Err(ProcessError::no_image())
}

/// Qualify a path-only URL with the request host
///
/// The scheme is always `http`; forwarded-proto headers from proxies are not
/// consulted.
fn absolute_url(url: &str, headers: &HeaderMap) -> String {
    if !url.starts_with('/') {
        return url.to_string();
    }
    match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => format!("http://{}{}", host, url),
        None => url.to_string(),
    }
}
