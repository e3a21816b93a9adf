use serde::{Deserialize, Serialize};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// AI model identifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AiModel {
    #[default]
    #[serde(rename = "gemini-pro")]
    GeminiPro,
    #[serde(rename = "gemini-pro-vision")]
    GeminiProVision,
    #[serde(rename = "gemini-ultra")]
    GeminiUltra,
    #[serde(rename = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-4-turbo")]
    Gpt4Turbo,
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl AiModel {
    pub const ALL: [AiModel; 6] = [
        AiModel::GeminiPro,
        AiModel::GeminiProVision,
        AiModel::GeminiUltra,
        AiModel::Gpt4,
        AiModel::Gpt4Turbo,
        AiModel::Gpt35Turbo,
    ];

    /// Stable identifier used in settings and on the command line
    pub fn id(self) -> &'static str {
        match self {
            AiModel::GeminiPro => "gemini-pro",
            AiModel::GeminiProVision => "gemini-pro-vision",
            AiModel::GeminiUltra => "gemini-ultra",
            AiModel::Gpt4 => "gpt-4",
            AiModel::Gpt4Turbo => "gpt-4-turbo",
            AiModel::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            AiModel::GeminiPro => "Gemini Pro",
            AiModel::GeminiProVision => "Gemini Pro Vision",
            AiModel::GeminiUltra => "Gemini Ultra",
            AiModel::Gpt4 => "GPT-4",
            AiModel::Gpt4Turbo => "GPT-4 Turbo",
            AiModel::Gpt35Turbo => "GPT-3.5 Turbo",
        }
    }

    /// Model name sent to the provider
    pub fn wire_name(self) -> &'static str {
        match self {
            AiModel::GeminiPro => "gemini-1.5-pro",
            AiModel::GeminiProVision => "gemini-1.5-pro-vision",
            AiModel::GeminiUltra => "gemini-1.5-ultra",
            AiModel::Gpt4 => "gpt-4",
            AiModel::Gpt4Turbo => "gpt-4-turbo-preview",
            AiModel::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }

    pub fn api_endpoint(self) -> String {
        match self {
            AiModel::GeminiPro | AiModel::GeminiProVision | AiModel::GeminiUltra => {
                format!("{}/{}:generateContent", GEMINI_API_BASE, self.wire_name())
            }
            AiModel::Gpt4 | AiModel::Gpt4Turbo | AiModel::Gpt35Turbo => OPENAI_API_URL.to_string(),
        }
    }

    /// Parse an id or display name, ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|m| {
            m.id().eq_ignore_ascii_case(name) || m.display_name().eq_ignore_ascii_case(name)
        })
    }
}

impl std::fmt::Display for AiModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_endpoint_embeds_model() {
        assert_eq!(
            AiModel::GeminiPro.api_endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-pro:generateContent"
        );
        assert_eq!(AiModel::Gpt4.api_endpoint(), OPENAI_API_URL);
    }

    #[test]
    fn test_parse_accepts_id_and_display_name() {
        assert_eq!(AiModel::parse("gpt-4-turbo"), Some(AiModel::Gpt4Turbo));
        assert_eq!(AiModel::parse("Gemini Ultra"), Some(AiModel::GeminiUltra));
        assert_eq!(AiModel::parse("claude"), None);
    }

    #[test]
    fn test_serde_uses_id() {
        for model in AiModel::ALL {
            let json = serde_json::to_string(&model).unwrap();
            assert_eq!(json, format!("\"{}\"", model.id()));
        }
    }
}
