//! Alpha flattening onto white
//!
//! A cutout from the segmenter carries its foreground mask in the alpha
//! channel. Flattening blends every pixel over an opaque white canvas:
//! `out = a/255 * color + (1 - a/255) * 255`, rounded per channel.

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};

use crate::error::ProcessError;

/// Decode uploaded bytes, sniffing the format from content
pub fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, ProcessError> {
    if bytes.is_empty() {
        return Err(ProcessError::InvalidImage("empty upload".to_string()));
    }
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ProcessError::InvalidImage("image has no pixels".to_string()));
    }
    Ok(image)
}

/// Normalize a segmenter result to RGBA and flatten it
pub fn flatten_dynamic(cutout: DynamicImage) -> Result<RgbImage, ProcessError> {
    if cutout.width() == 0 || cutout.height() == 0 {
        return Err(ProcessError::InvalidImage("cutout has no pixels".to_string()));
    }
    Ok(flatten_onto_white(&cutout.into_rgba8()))
}

/// Composite an RGBA cutout onto white, dropping the alpha channel
pub fn flatten_onto_white(cutout: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(cutout.width(), cutout.height());
    for (dst, src) in out.pixels_mut().zip(cutout.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = Rgb([blend(r, a), blend(g, a), blend(b, a)]);
    }
    out
}

/// Blend one channel over white, rounding to nearest
///
/// `(a*c + (255-a)*255) / 255` is never exactly halfway between integers,
/// so adding 127 before the division rounds correctly.
#[inline]
fn blend(color: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let c = u32::from(color);
    ((a * c + (255 - a) * 255 + 127) / 255) as u8
}
