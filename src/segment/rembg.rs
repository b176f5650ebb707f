//! rembg HTTP client
//!
//! Posts the image to `POST {base_url}/api/remove` as multipart field `file`
//! with the model name as form field `model`; the server answers with a PNG
//! cutout.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use reqwest::{multipart, Client};
use tracing::{debug, warn};

use super::{SegmentError, Segmenter};

/// Handle to a rembg server with a preloaded model
#[derive(Debug, Clone)]
pub struct RembgClient {
    /// HTTP client
    client: Client,
    /// Server base URL
    base_url: String,
    /// Model name (u2net, isnet-general-use, ...)
    model: String,
}

impl RembgClient {
    /// Create a new client; `timeout` of `None` waits indefinitely
    pub fn new(
        base_url: &str,
        model: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, SegmentError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/remove", self.base_url)
    }
}

#[async_trait]
impl Segmenter for RembgClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn remove_background(
        &self,
        image: &DynamicImage,
    ) -> Result<DynamicImage, SegmentError> {
        let input = image.clone();
        let png = tokio::task::spawn_blocking(move || encode_png(&input))
            .await
            .map_err(|e| SegmentError::Encode(e.to_string()))??;

        debug!(
            "Sending {} bytes to segmentation server (model {})",
            png.len(),
            self.model
        );

        let part = multipart::Part::bytes(png)
            .file_name("image.png")
            .mime_str("image/png")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Segmentation server error: {} - {}", status, body);
            return Err(SegmentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map_err(|e| SegmentError::Decode(e.to_string()))
        })
        .await
        .map_err(|e| SegmentError::Decode(e.to_string()))?
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, SegmentError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| SegmentError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}
