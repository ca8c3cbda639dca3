//! Image decoding and square PNG thumbnail encoding.
//!
//! These calls are CPU-bound; async callers run them on the blocking pool.

use image::{DynamicImage, ImageError, ImageFormat, imageops::FilterType};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] ImageError),
    #[error("failed to encode thumbnail: {0}")]
    Encode(#[source] ImageError),
}

pub fn decode(bytes: &[u8]) -> Result<DynamicImage, CodecError> {
    image::load_from_memory(bytes).map_err(CodecError::Decode)
}

/// Scale and center-crop `image` to exactly `size`×`size` pixels, keeping
/// the aspect ratio by trimming the excess, then encode it as PNG.
pub fn fit_square_png(image: &DynamicImage, size: u32) -> Result<Vec<u8>, CodecError> {
    let thumbnail = image.resize_to_fill(size, size, FilterType::Lanczos3);
    debug!(
        source_width = image.width(),
        source_height = image.height(),
        size,
        "fitted thumbnail"
    );

    let mut buf = Cursor::new(Vec::new());
    thumbnail
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(CodecError::Encode)?;
    Ok(buf.into_inner())
}
