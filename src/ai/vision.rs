//! Vision utilities for naming requests
//!
//! Re-encodes image files as JPEG and keeps the inline payload under the
//! request size cap.

use image::DynamicImage;
use std::path::Path;

use super::naming::NamingError;
use crate::conversion::encode_jpeg;

/// Maximum inline payload size (4 MiB)
pub const MAX_INLINE_BYTES: usize = 4 * 1024 * 1024;

/// Starting JPEG quality for inline payloads
const INITIAL_QUALITY: u8 = 80;

/// Lowest quality tried before giving up
const MIN_QUALITY: u8 = 10;

const QUALITY_STEP: u8 = 10;

/// Encode `img` as JPEG no larger than `cap` bytes.
///
/// Starts at quality 80 and lowers it 10 points at a time.
pub fn compress_to_cap(img: &DynamicImage, cap: usize) -> Result<Vec<u8>, NamingError> {
    let encode = |quality: u8| {
        encode_jpeg(img, quality)
            .map_err(|e| NamingError::UnreadableInput(format!("Failed to encode image: {}", e)))
    };

    let mut quality = INITIAL_QUALITY;
    let mut data = encode(quality)?;

    while data.len() > cap && quality > MIN_QUALITY {
        quality -= QUALITY_STEP;
        data = encode(quality)?;
    }

    if data.len() > cap {
        return Err(NamingError::UnreadableInput(format!(
            "Image is {} bytes after compression, limit is {}",
            data.len(),
            cap
        )));
    }

    tracing::debug!(quality, bytes = data.len(), "Prepared inline image");
    Ok(data)
}

/// Decode raw image bytes and prepare them as an inline JPEG payload
pub fn prepare_image_for_request(image_data: &[u8]) -> Result<Vec<u8>, NamingError> {
    let img = image::load_from_memory(image_data)
        .map_err(|e| NamingError::UnreadableInput(format!("Failed to load image: {}", e)))?;

    compress_to_cap(&img, MAX_INLINE_BYTES)
}

/// Load and prepare an image file for a naming request
pub async fn load_image_for_request(path: &Path) -> Result<Vec<u8>, NamingError> {
    let data = tokio::fs::read(path).await.map_err(|e| {
        NamingError::UnreadableInput(format!("Failed to read image {}: {}", path.display(), e))
    })?;

    tokio::task::spawn_blocking(move || prepare_image_for_request(&data))
        .await
        .map_err(|e| NamingError::UnreadableInput(format!("Image task failed: {}", e)))?
}
