//! Dimension probing for retrieved image bytes.

use std::io::Cursor;

use bytes::Bytes;

use crate::domain::entities::ImageDimensions;
use crate::domain::errors::{ImageError, ImageResult};

/// Reads the pixel dimensions from encoded bytes without a full decode.
///
/// # Errors
/// Returns `DecodeFailure` if the format is unknown or the header is malformed.
pub fn probe_dimensions(url: &str, bytes: &[u8]) -> ImageResult<ImageDimensions> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::decode(url, format!("Failed to guess format: {e}")))?;

    if reader.format().is_none() {
        return Err(ImageError::decode(url, "Unrecognised image format"));
    }

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ImageError::decode(url, format!("Failed to read dimensions: {e}")))?;

    Ok(ImageDimensions::new(width, height))
}

/// Probes dimensions on the blocking pool.
///
/// # Errors
/// Returns `DecodeFailure` if probing fails or the task panics.
pub async fn probe_dimensions_blocking(url: &str, bytes: Bytes) -> ImageResult<ImageDimensions> {
    let url_for_task = url.to_string();
    tokio::task::spawn_blocking(move || probe_dimensions(&url_for_task, &bytes))
        .await
        .map_err(|e| ImageError::decode(url, format!("Decode task panicked: {e}")))?
}
