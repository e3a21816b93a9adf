pub mod http_client;
pub mod models;
pub mod naming;
pub mod prompts;
pub mod vision;

pub use models::AiModel;
pub use naming::{clean_file_name, GeminiNamingClient, ModelConfig, NameSuggester, NamingError};
