//! Naming suggester
//!
//! Issues one `generateContent` request per file and returns the first
//! candidate's text, cleaned up for use as a file name.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::http_client::naming_client;
use super::models::AiModel;
use super::prompts::build_filename_part;
use super::vision::load_image_for_request;
use crate::formats::FileCategory;
use crate::models::FileEntry;

/// Characters that may not appear in a suggested file name
const ILLEGAL_FILENAME_CHARS: &[char] = &[':', '/', '\\', '?', '%', '*', '|', '"', '<', '>'];

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("No API key configured for {0}")]
    MissingCredential(AiModel),
    #[error("No prompt template configured for {0} files")]
    MissingTemplate(FileCategory),
    #[error("Invalid API endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("HTTP error: {0}")]
    HttpError(u16),
    #[error("The model returned no usable file name")]
    EmptySuggestion,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Cannot read file content: {0}")]
    UnreadableInput(String),
}

/// Model, credential and prompt resolved for one entry
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model: AiModel,
    pub api_key: Option<String>,
    pub prompt: Option<String>,
}

/// Something that can propose a file name for an entry
#[async_trait]
pub trait NameSuggester: Send + Sync {
    async fn suggest_name(&self, entry: &FileEntry, config: &ModelConfig)
        -> Result<String, NamingError>;
}

/// Remove characters illegal in file names and surrounding whitespace
pub fn clean_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

/// Content part in request order
#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

impl RequestPart {
    fn text(text: impl Into<String>) -> Self {
        RequestPart::Text { text: text.into() }
    }

    fn jpeg(data: &[u8]) -> Self {
        RequestPart::InlineData {
            inline_data: InlineData {
                mime_type: "image/jpeg".to_string(),
                data: STANDARD.encode(data),
            },
        }
    }
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// First candidate's first text part
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
    }
}

/// Naming client speaking the `generateContent` wire format
pub struct GeminiNamingClient {
    client: Client,
    endpoint_override: Option<String>,
}

impl GeminiNamingClient {
    pub fn new() -> Self {
        Self {
            client: naming_client().clone(),
            endpoint_override: None,
        }
    }

    /// Send every request to `endpoint` instead of the model's own
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: naming_client().clone(),
            endpoint_override: Some(endpoint.into()),
        }
    }

    fn request_url(&self, model: AiModel, api_key: &str) -> Result<Url, NamingError> {
        let endpoint = self
            .endpoint_override
            .clone()
            .unwrap_or_else(|| model.api_endpoint());

        Url::parse_with_params(&endpoint, &[("key", api_key)])
            .map_err(|e| NamingError::InvalidEndpoint(format!("{}: {}", endpoint, e)))
    }

    async fn build_request(
        &self,
        entry: &FileEntry,
        prompt: &str,
    ) -> Result<GenerateRequest, NamingError> {
        let mut parts = vec![RequestPart::text(prompt)];

        if entry.category() == FileCategory::Image {
            let image = load_image_for_request(&entry.source).await?;
            parts.push(RequestPart::jpeg(&image));
        }

        parts.push(RequestPart::text(build_filename_part(&entry.original_name)));

        Ok(GenerateRequest {
            contents: vec![RequestContent { parts }],
        })
    }
}

impl Default for GeminiNamingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NameSuggester for GeminiNamingClient {
    async fn suggest_name(
        &self,
        entry: &FileEntry,
        config: &ModelConfig,
    ) -> Result<String, NamingError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(NamingError::MissingCredential(config.model))?;

        let prompt = config
            .prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(NamingError::MissingTemplate(entry.category()))?;

        let url = self.request_url(config.model, api_key)?;
        let request = self.build_request(entry, prompt).await?;

        tracing::debug!(
            file = %entry.original_name,
            model = config.model.id(),
            "Requesting name suggestion"
        );

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NamingError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(file = %entry.original_name, status = status.as_u16(), "Naming request failed");
            return Err(NamingError::HttpError(status.as_u16()));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| NamingError::NetworkError(format!("Failed to parse response: {}", e)))?;

        let suggestion = body.first_text().ok_or(NamingError::EmptySuggestion)?;
        let cleaned = clean_file_name(&suggestion);
        if cleaned.is_empty() {
            return Err(NamingError::EmptySuggestion);
        }

        Ok(cleaned)
    }
}
