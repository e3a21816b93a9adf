use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::{self, OpenOptions};
use std::io::{Cursor, Write};
use std::path::Path;

use super::{ConversionError, FileConverter};
use crate::formats::normalize_extension;

/// Quality used when re-encoding to JPEG
const JPEG_QUALITY: u8 = 90;

/// Raster formats the image converter can read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Jpeg,
    Png,
    Gif,
    Tiff,
}

impl RasterFormat {
    pub const ALL: [RasterFormat; 4] = [
        RasterFormat::Jpeg,
        RasterFormat::Png,
        RasterFormat::Gif,
        RasterFormat::Tiff,
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match normalize_extension(ext).as_str() {
            "jpg" | "jpeg" => Some(RasterFormat::Jpeg),
            "png" => Some(RasterFormat::Png),
            "gif" => Some(RasterFormat::Gif),
            "tiff" => Some(RasterFormat::Tiff),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            RasterFormat::Jpeg => "jpg",
            RasterFormat::Png => "png",
            RasterFormat::Gif => "gif",
            RasterFormat::Tiff => "tiff",
        }
    }
}

/// Encode an image as JPEG at the given quality (1-100)
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> image::ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
    Ok(buffer.into_inner())
}

fn encode(img: &DynamicImage, format: RasterFormat) -> Result<Vec<u8>, ConversionError> {
    let failed = |e: image::ImageError| {
        ConversionError::ConversionFailed(format!(
            "Failed to encode {}: {}",
            format.extension(),
            e
        ))
    };

    match format {
        RasterFormat::Jpeg => encode_jpeg(img, JPEG_QUALITY).map_err(failed),
        RasterFormat::Png => {
            let mut buffer = Cursor::new(Vec::new());
            img.write_to(&mut buffer, ImageFormat::Png).map_err(failed)?;
            Ok(buffer.into_inner())
        }
        RasterFormat::Gif => {
            let mut buffer = Cursor::new(Vec::new());
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut buffer, ImageFormat::Gif)
                .map_err(failed)?;
            Ok(buffer.into_inner())
        }
        RasterFormat::Tiff => {
            // TIFF encoder only takes 8-bit RGB(A)
            let normalized = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            let mut buffer = Cursor::new(Vec::new());
            normalized
                .write_to(&mut buffer, ImageFormat::Tiff)
                .map_err(failed)?;
            Ok(buffer.into_inner())
        }
    }
}

/// Write `data` to a file that must not exist yet, removing it again if the
/// write does not complete.
fn write_new_file(path: &Path, data: &[u8]) -> Result<(), ConversionError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| {
            ConversionError::ConversionFailed(format!(
                "Failed to create {}: {}",
                path.display(),
                e
            ))
        })?;

    if let Err(e) = file.write_all(data).and_then(|_| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(ConversionError::ConversionFailed(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        )));
    }

    Ok(())
}

/// Re-encodes raster images between the basic formats
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageConverter;

impl FileConverter for ImageConverter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn can_convert(&self, from: &str, to: &str) -> bool {
        RasterFormat::from_extension(from).is_some() && RasterFormat::from_extension(to).is_some()
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        let ext_of = |p: &Path| {
            p.extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string()
        };
        let (from, to) = (ext_of(input), ext_of(output));

        let target = match (RasterFormat::from_extension(&from), RasterFormat::from_extension(&to)) {
            (Some(_), Some(target)) => target,
            _ => return Err(ConversionError::UnsupportedFormat { from, to }),
        };

        let img = ImageReader::open(input)
            .map_err(|e| ConversionError::InvalidInput(format!("{}: {}", input.display(), e)))?
            .with_guessed_format()
            .map_err(|e| ConversionError::InvalidInput(format!("{}: {}", input.display(), e)))?
            .decode()
            .map_err(|e| ConversionError::InvalidInput(format!("{}: {}", input.display(), e)))?;

        let data = encode(&img, target)?;
        write_new_file(output, &data)?;

        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            bytes = data.len(),
            "Image converted"
        );
        Ok(())
    }
}
