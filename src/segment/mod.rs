//! Background segmentation
//!
//! Segmentation is delegated to an external model. The [`Segmenter`] trait is
//! the contract the request pipeline relies on; [`RembgClient`] talks to a
//! rembg-compatible HTTP server holding the preloaded model.

mod rembg;

use async_trait::async_trait;
use image::DynamicImage;
use thiserror::Error;

pub use rembg::RembgClient;

/// Segmentation errors
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("segmentation server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not encode input: {0}")]
    Encode(String),

    #[error("could not decode cutout: {0}")]
    Decode(String),
}

/// Produces an alpha-masked cutout from a decoded image
///
/// Implementations are shared across concurrent requests and must not hold
/// request-scoped state.
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Model identifier, for logging
    fn model(&self) -> &str;

    /// Remove the background, returning the foreground with a meaningful alpha channel
    async fn remove_background(&self, image: &DynamicImage)
        -> Result<DynamicImage, SegmentError>;
}
