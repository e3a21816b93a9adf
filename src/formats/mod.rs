//! Format registry
//!
//! Static extension tables, the extension → category lookup and the
//! declarative conversion-rule table persisted with the settings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::AiModel;
use crate::conversion;

/// Coarse file-type grouping derived from the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Text,
    Image,
    Audio,
    Video,
    Office,
    Archive,
    Other,
}

impl FileCategory {
    pub const ALL: [FileCategory; 7] = [
        FileCategory::Text,
        FileCategory::Image,
        FileCategory::Audio,
        FileCategory::Video,
        FileCategory::Office,
        FileCategory::Archive,
        FileCategory::Other,
    ];

    /// Known `(label, extension)` pairs for this category.
    ///
    /// `Other` holds a single empty extension meaning "keep the original".
    pub fn extensions(self) -> &'static [(&'static str, &'static str)] {
        match self {
            FileCategory::Text => &[
                ("Plain text", "txt"),
                ("Markdown", "md"),
                ("Rich text", "rtf"),
                ("Source code", "swift"),
                ("HTML", "html"),
            ],
            FileCategory::Image => &[
                ("PNG image", "png"),
                ("JPEG image", "jpg"),
                ("GIF animation", "gif"),
                ("HEIC image", "heic"),
                ("WebP image", "webp"),
            ],
            FileCategory::Audio => &[
                ("MP3 audio", "mp3"),
                ("WAV audio", "wav"),
                ("AAC audio", "aac"),
                ("Apple audio", "m4a"),
            ],
            FileCategory::Video => &[
                ("MP4 video", "mp4"),
                ("MOV video", "mov"),
                ("AVI video", "avi"),
                ("MKV video", "mkv"),
            ],
            FileCategory::Office => &[
                ("Word document", "docx"),
                ("Excel spreadsheet", "xlsx"),
                ("PowerPoint deck", "pptx"),
                ("PDF document", "pdf"),
                ("Pages document", "pages"),
                ("Numbers spreadsheet", "numbers"),
                ("Keynote deck", "key"),
            ],
            FileCategory::Archive => &[
                ("ZIP archive", "zip"),
                ("RAR archive", "rar"),
                ("7Z archive", "7z"),
            ],
            FileCategory::Other => &[("Keep original extension", "")],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Text => "text",
            FileCategory::Image => "image",
            FileCategory::Audio => "audio",
            FileCategory::Video => "video",
            FileCategory::Office => "office",
            FileCategory::Archive => "archive",
            FileCategory::Other => "other",
        }
    }

    /// Parse a category name as printed by [`FileCategory::as_str`]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a user-supplied extension: trimmed, no leading dot, lowercase
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Category for an extension. Unknown and empty extensions map to `Other`.
pub fn category_of(extension: &str) -> FileCategory {
    let ext = normalize_extension(extension);
    if ext.is_empty() {
        return FileCategory::Other;
    }

    FileCategory::ALL
        .into_iter()
        .find(|category| category.extensions().iter().any(|(_, e)| *e == ext))
        .unwrap_or(FileCategory::Other)
}

/// Every non-empty extension in the registry, in table order
pub fn all_extensions() -> Vec<&'static str> {
    FileCategory::ALL
        .iter()
        .flat_map(|c| c.extensions().iter().map(|(_, ext)| *ext))
        .filter(|ext| !ext.is_empty())
        .collect()
}

/// Strategy used to carry out a conversion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationMethod {
    ImageMagick,
    PdfKit,
    Quartz,
    OpenAiTts,
    GeminiVision,
    Local,
    Ai,
}

impl ImplementationMethod {
    pub fn label(self) -> &'static str {
        match self {
            ImplementationMethod::ImageMagick => "ImageMagick",
            ImplementationMethod::PdfKit => "PDFKit",
            ImplementationMethod::Quartz => "Quartz",
            ImplementationMethod::OpenAiTts => "OpenAI TTS",
            ImplementationMethod::GeminiVision => "Gemini Vision",
            ImplementationMethod::Local => "Local frameworks",
            ImplementationMethod::Ai => "AI model",
        }
    }

    /// Strategies offered for a source → target pair, preferred first
    pub fn available_methods(source: &str, target: &str) -> Vec<ImplementationMethod> {
        use FileCategory::*;
        use ImplementationMethod::*;

        match (category_of(source), category_of(target)) {
            (Image, Image) => vec![ImageMagick, Local, Ai],
            (Office, Text) => vec![PdfKit, Local, Ai],
            (Text, Office) => vec![Quartz, Local, Ai],
            (Text, Audio) => vec![OpenAiTts, Ai],
            (Image, _) | (_, Image) => vec![GeminiVision, Ai],
            _ => vec![Ai],
        }
    }
}

/// Declarative source → target conversion rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatConversion {
    pub id: Uuid,
    pub source_format: String,
    pub target_format: String,
    pub model: AiModel,
    pub prompt: String,
    pub implementation: String,
    pub selected_method: ImplementationMethod,
}

impl FormatConversion {
    pub fn new(source_format: &str, target_format: &str) -> Self {
        let selected_method = ImplementationMethod::available_methods(source_format, target_format)
            .first()
            .copied()
            .unwrap_or(ImplementationMethod::Ai);

        Self {
            id: Uuid::new_v4(),
            source_format: source_format.to_string(),
            target_format: target_format.to_string(),
            model: AiModel::default(),
            prompt: format!(
                "Convert the file from {} format to {} format",
                source_format, target_format
            ),
            implementation: selected_method.label().to_string(),
            selected_method,
        }
    }

    /// Whether the conversion executor can actually perform this rule
    pub fn is_implemented(&self) -> bool {
        conversion::is_implemented_pair(&self.source_format, &self.target_format)
    }
}

/// The declared rule table: every ordered pair of known extensions,
/// identity pairs included.
pub fn generate_all_conversions() -> Vec<FormatConversion> {
    let formats = all_extensions();
    let mut conversions = Vec::with_capacity(formats.len() * formats.len());

    for source in &formats {
        for target in &formats {
            conversions.push(FormatConversion::new(source, target));
        }
    }

    tracing::debug!(count = conversions.len(), "Generated conversion rule table");
    conversions
}
