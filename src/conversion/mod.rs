//! Conversion executor
//!
//! A small set of [`FileConverter`]s behind a [`ConversionService`] that
//! picks the first converter accepting a pair and writes collision-free
//! output next to the input file.

mod raster;

pub use self::raster::{encode_jpeg, ImageConverter, RasterFormat};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::formats::normalize_extension;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Unsupported conversion: {from} to {to}")]
    UnsupportedFormat { from: String, to: String },
    #[error("Cannot read source file: {0}")]
    InvalidInput(String),
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),
}

/// One format transformation strategy.
///
/// `convert` is blocking; [`ConversionService`] moves it onto the blocking pool.
pub trait FileConverter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this converter handles `from` → `to` (extensions, any case)
    fn can_convert(&self, from: &str, to: &str) -> bool;

    /// Convert `input` into a new file at `output`.
    /// Leaves nothing at `output` on failure.
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError>;
}

/// Whether the built-in converters implement `from` → `to`
pub fn is_implemented_pair(from: &str, to: &str) -> bool {
    ImageConverter.can_convert(from, to)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

/// `<dir>/<stem>_converted.<ext>`, or `<stem>_converted_<n>.<ext>` with the
/// first `n` that is free.
pub fn unique_output_path(input: &Path, target_ext: &str) -> PathBuf {
    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut candidate = dir.join(format!("{}_converted.{}", stem, target_ext));
    let mut counter = 1u32;
    while candidate.exists() {
        candidate = dir.join(format!("{}_converted_{}.{}", stem, counter, target_ext));
        counter += 1;
    }
    candidate
}

/// Registry of converters
#[derive(Clone)]
pub struct ConversionService {
    converters: Vec<Arc<dyn FileConverter>>,
}

impl Default for ConversionService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionService {
    pub fn new() -> Self {
        Self {
            converters: vec![Arc::new(ImageConverter)],
        }
    }

    pub fn with_converters(converters: Vec<Arc<dyn FileConverter>>) -> Self {
        Self { converters }
    }

    pub fn can_convert(&self, from: &str, to: &str) -> bool {
        self.converter_for(from, to).is_some()
    }

    fn converter_for(&self, from: &str, to: &str) -> Option<Arc<dyn FileConverter>> {
        self.converters
            .iter()
            .find(|c| c.can_convert(from, to))
            .cloned()
    }

    /// Output extensions reachable from `input_ext`
    pub fn supported_output_formats(&self, input_ext: &str) -> Vec<&'static str> {
        RasterFormat::ALL
            .iter()
            .map(|f| f.extension())
            .filter(|ext| self.can_convert(input_ext, ext))
            .collect()
    }

    /// Convert `input` into a new file at `output`
    pub async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        let (from, to) = (extension_of(input), extension_of(output));
        let converter = self
            .converter_for(&from, &to)
            .ok_or(ConversionError::UnsupportedFormat { from, to })?;
        tracing::debug!(converter = converter.name(), input = %input.display(), "Converting");

        let (input, output) = (input.to_path_buf(), output.to_path_buf());
        tokio::task::spawn_blocking(move || converter.convert(&input, &output))
            .await
            .map_err(|e| ConversionError::ConversionFailed(format!("Conversion task failed: {}", e)))?
    }

    /// Convert `input` to `target_ext`, writing next to it under a
    /// collision-free `_converted` name. Returns the new path.
    pub async fn convert_to(&self, input: &Path, target_ext: &str) -> Result<PathBuf, ConversionError> {
        let target_ext = normalize_extension(target_ext);
        let from = extension_of(input);
        if !self.can_convert(&from, &target_ext) {
            return Err(ConversionError::UnsupportedFormat {
                from,
                to: target_ext,
            });
        }

        let output = unique_output_path(input, &target_ext);
        self.convert(input, &output).await?;

        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            "Converted file"
        );
        Ok(output)
    }
}
