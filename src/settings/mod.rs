//! Application settings
//!
//! The persisted settings blob, its lenient decoding, and a shared handle the
//! batch orchestrator reads from at the start of every entry.

mod store;

pub use store::{PreferenceStore, SettingsError, SETTINGS_KEY};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::ai::prompts::{IMAGE_PROMPT, TEXT_PROMPT};
use crate::ai::{AiModel, ModelConfig};
use crate::formats::{generate_all_conversions, FileCategory, FormatConversion, ImplementationMethod};

/// Environment variable consulted when no key is stored for the active model
pub const API_KEY_ENV: &str = "MAYBE_F2_API_KEY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppearanceMode {
    Light,
    Dark,
    #[default]
    System,
}

/// Declarative rename rule. Persisted, not executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRule {
    pub id: Uuid,
    pub name: String,
    pub file_type: FileCategory,
    pub model: AiModel,
    pub prompt: String,
    pub implementation: String,
    pub selected_method: ImplementationMethod,
}

impl Default for RenameRule {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            file_type: FileCategory::Image,
            model: AiModel::default(),
            prompt: String::new(),
            implementation: String::new(),
            selected_method: ImplementationMethod::Ai,
        }
    }
}

/// Persisted settings.
///
/// Decoding is field-by-field: a missing, `null` or malformed field keeps its
/// default instead of rejecting the whole blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub appearance_mode: AppearanceMode,
    /// Stored only; nothing registers a login item
    pub launch_at_login: bool,
    /// Model used for categories without an override
    pub ai_model: AiModel,
    pub api_keys: BTreeMap<AiModel, String>,
    pub temperature: f64,
    /// Per-category model overrides
    pub conversion_models: BTreeMap<FileCategory, AiModel>,
    pub prompt_templates: BTreeMap<FileCategory, String>,
    pub format_conversions: Vec<FormatConversion>,
    pub rename_rules: Vec<RenameRule>,
}

impl Default for Settings {
    fn default() -> Self {
        let prompt_templates = BTreeMap::from([
            (FileCategory::Image, IMAGE_PROMPT.to_string()),
            (FileCategory::Text, TEXT_PROMPT.to_string()),
        ]);

        Self {
            appearance_mode: AppearanceMode::System,
            launch_at_login: false,
            ai_model: AiModel::GeminiPro,
            api_keys: BTreeMap::new(),
            temperature: 0.7,
            conversion_models: BTreeMap::new(),
            prompt_templates,
            format_conversions: generate_all_conversions(),
            rename_rules: Vec::new(),
        }
    }
}

impl Settings {
    /// Model for a category: its override if present, else the global model
    pub fn model_for(&self, category: FileCategory) -> AiModel {
        self.conversion_models
            .get(&category)
            .copied()
            .unwrap_or(self.ai_model)
    }

    /// Resolve model, credential and prompt for entries of `category`
    pub fn model_config_for(&self, category: FileCategory) -> ModelConfig {
        let model = self.model_for(category);

        ModelConfig {
            model,
            api_key: self.api_keys.get(&model).cloned(),
            prompt: self.prompt_templates.get(&category).cloned(),
        }
    }

    /// Rules the conversion executor can actually carry out
    pub fn implemented_conversions(&self) -> impl Iterator<Item = &FormatConversion> {
        self.format_conversions.iter().filter(|c| c.is_implemented())
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        let mut settings = Settings::default();

        for (key, value) in fields {
            let applied = match key.as_str() {
                "appearanceMode" => set_field(&mut settings.appearance_mode, value),
                "launchAtLogin" => set_field(&mut settings.launch_at_login, value),
                "aiModel" => set_field(&mut settings.ai_model, value),
                "apiKeys" => set_map(&mut settings.api_keys, value),
                "temperature" => set_field(&mut settings.temperature, value),
                "conversionModels" => set_map(&mut settings.conversion_models, value),
                "promptTemplates" => set_map(&mut settings.prompt_templates, value),
                "formatConversions" => set_list(&mut settings.format_conversions, value),
                "renameRules" => set_list(&mut settings.rename_rules, value),
                _ => Ok(()),
            };

            if let Err(e) = applied {
                tracing::warn!(field = %key, error = %e, "Invalid settings field, keeping default");
            }
        }

        Ok(settings)
    }
}

/// Overwrite `slot` unless `value` is null
fn set_field<T: DeserializeOwned>(slot: &mut T, value: Value) -> Result<(), serde_json::Error> {
    if !value.is_null() {
        *slot = serde_json::from_value(value)?;
    }
    Ok(())
}

/// Replace `slot` with a string-keyed map, dropping entries whose key or
/// value does not parse.
fn set_map<K, V>(slot: &mut BTreeMap<K, V>, value: Value) -> Result<(), serde_json::Error>
where
    K: DeserializeOwned + Ord,
    V: DeserializeOwned,
{
    if value.is_null() {
        return Ok(());
    }
    let raw: Map<String, Value> = serde_json::from_value(value)?;
    let mut map = BTreeMap::new();

    for (key, value) in raw {
        let parsed_key = serde_json::from_value::<K>(Value::String(key.clone()));
        let parsed_value = serde_json::from_value::<V>(value);

        match (parsed_key, parsed_value) {
            (Ok(k), Ok(v)) => {
                map.insert(k, v);
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(key = %key, error = %e, "Dropping unrecognized settings entry");
            }
        }
    }

    *slot = map;
    Ok(())
}

fn set_list<T: DeserializeOwned>(slot: &mut Vec<T>, value: Value) -> Result<(), serde_json::Error> {
    if value.is_null() {
        return Ok(());
    }
    let raw: Vec<Value> = serde_json::from_value(value)?;

    *slot = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping unrecognized settings list item");
                None
            }
        })
        .collect();
    Ok(())
}

/// Shared, observable settings.
///
/// Cloning the handle shares the same settings; every update is persisted
/// when a store is attached and broadcast to subscribers.
#[derive(Clone)]
pub struct SettingsHandle {
    tx: Arc<watch::Sender<Settings>>,
    store: Option<Arc<PreferenceStore>>,
    fallback_key: Option<String>,
}

impl SettingsHandle {
    /// In-memory handle
    pub fn new(settings: Settings) -> Self {
        let (tx, _rx) = watch::channel(settings);
        Self {
            tx: Arc::new(tx),
            store: None,
            fallback_key: None,
        }
    }

    /// Load from `store` and persist every later update back to it
    pub fn load(store: PreferenceStore) -> Self {
        let settings = store.load_settings();
        let mut handle = Self::new(settings);
        handle.store = Some(Arc::new(store));
        handle
    }

    /// Credential used for the active model when none is stored
    pub fn with_fallback_key(mut self, key: Option<String>) -> Self {
        self.fallback_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn snapshot(&self) -> Settings {
        self.tx.borrow().clone()
    }

    pub fn update<F>(&self, f: F) -> Result<(), SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        self.tx.send_modify(f);

        if let Some(store) = &self.store {
            store.save_settings(&self.snapshot())?;
        }
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    pub fn model_config_for(&self, category: FileCategory) -> ModelConfig {
        let mut config = self.tx.borrow().model_config_for(category);
        if config.api_key.is_none() {
            config.api_key = self.fallback_key.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.appearance_mode, AppearanceMode::System);
        assert_eq!(settings.ai_model, AiModel::GeminiPro);
        assert_eq!(settings.temperature, 0.7);
        assert!(settings.prompt_templates.contains_key(&FileCategory::Image));
        assert!(settings.prompt_templates.contains_key(&FileCategory::Text));
        assert!(!settings.format_conversions.is_empty());
        assert!(settings.rename_rules.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let mut settings = Settings::default();
        settings.api_keys.insert(AiModel::Gpt4, "sk-test".to_string());
        settings.conversion_models.insert(FileCategory::Image, AiModel::GeminiProVision);
        settings.rename_rules.push(RenameRule {
            name: "Photos".to_string(),
            ..RenameRule::default()
        });

        let json = serde_json::to_string(&settings).unwrap();
        let decoded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, settings);
    }

    #[test]
    fn test_serialized_field_names() {
        let mut settings = Settings::default();
        settings.api_keys.insert(AiModel::GeminiPro, "k".to_string());
        let value = serde_json::to_value(&settings).unwrap();

        assert_eq!(value["appearanceMode"], "System");
        assert_eq!(value["aiModel"], "gemini-pro");
        assert_eq!(value["apiKeys"]["gemini-pro"], "k");
        assert!(value["promptTemplates"]["image"].is_string());
        assert!(value["formatConversions"].is_array());
        assert_eq!(value["launchAtLogin"], false);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let decoded: Settings = serde_json::from_value(json!({ "aiModel": "gpt-4" })).unwrap();
        assert_eq!(decoded.ai_model, AiModel::Gpt4);
        assert_eq!(decoded.temperature, 0.7);
        assert_eq!(decoded.prompt_templates, Settings::default().prompt_templates);
    }

    #[test]
    fn test_unknown_map_keys_are_dropped() {
        let decoded: Settings = serde_json::from_value(json!({
            "apiKeys": { "gemini-pro": "good", "claude-9": "bad" },
            "promptTemplates": { "image": "describe", "spreadsheet": "nope" },
            "conversionModels": { "text": "gpt-4", "audio": "not-a-model" },
            "someFutureField": true
        }))
        .unwrap();

        assert_eq!(decoded.api_keys.len(), 1);
        assert_eq!(decoded.api_keys[&AiModel::GeminiPro], "good");
        assert_eq!(decoded.prompt_templates.len(), 1);
        assert_eq!(decoded.conversion_models.len(), 1);
        assert_eq!(decoded.conversion_models[&FileCategory::Text], AiModel::Gpt4);
    }

    #[test]
    fn test_null_and_malformed_fields_keep_their_defaults() {
        let decoded: Settings = serde_json::from_value(json!({
            "aiModel": "gpt-4",
            "apiKeys": { "gpt-4": "sk" },
            "renameRules": null,
            "promptTemplates": null,
            "temperature": "warm",
            "appearanceMode": null,
            "conversionModels": [1, 2]
        }))
        .unwrap();

        assert_eq!(decoded.ai_model, AiModel::Gpt4);
        assert_eq!(decoded.api_keys[&AiModel::Gpt4], "sk");
        assert!(decoded.rename_rules.is_empty());
        assert_eq!(decoded.prompt_templates, Settings::default().prompt_templates);
        assert_eq!(decoded.temperature, 0.7);
        assert_eq!(decoded.appearance_mode, AppearanceMode::System);
        assert!(decoded.conversion_models.is_empty());
    }

    #[test]
    fn test_model_config_resolution() {
        let mut settings = Settings::default();
        settings.api_keys.insert(AiModel::GeminiPro, "gemini-key".to_string());
        settings.conversion_models.insert(FileCategory::Text, AiModel::Gpt4);

        let image = settings.model_config_for(FileCategory::Image);
        assert_eq!(image.model, AiModel::GeminiPro);
        assert_eq!(image.api_key.as_deref(), Some("gemini-key"));
        assert_eq!(image.prompt.as_deref(), Some(IMAGE_PROMPT));

        let text = settings.model_config_for(FileCategory::Text);
        assert_eq!(text.model, AiModel::Gpt4);
        assert_eq!(text.api_key, None);

        assert_eq!(settings.model_config_for(FileCategory::Audio).prompt, None);
    }

    #[test]
    fn test_implemented_conversions_are_image_pairs() {
        let settings = Settings::default();
        assert!(settings.implemented_conversions().count() > 0);
        assert!(settings
            .implemented_conversions()
            .all(|c| c.source_format != "txt" && c.target_format != "txt"));
    }

    #[tokio::test]
    async fn test_handle_update_notifies_subscribers() {
        let handle = SettingsHandle::new(Settings::default());
        let mut rx = handle.subscribe();

        handle.update(|s| s.ai_model = AiModel::Gpt35Turbo).unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().ai_model, AiModel::Gpt35Turbo);
        assert_eq!(handle.clone().snapshot().ai_model, AiModel::Gpt35Turbo);
    }

    #[test]
    fn test_handle_fallback_key() {
        let handle = SettingsHandle::new(Settings::default()).with_fallback_key(Some("env-key".into()));
        assert_eq!(
            handle.model_config_for(FileCategory::Image).api_key.as_deref(),
            Some("env-key")
        );

        handle
            .update(|s| {
                s.api_keys.insert(AiModel::GeminiPro, "stored".to_string());
            })
            .unwrap();
        assert_eq!(
            handle.model_config_for(FileCategory::Image).api_key.as_deref(),
            Some("stored")
        );

        let blank = SettingsHandle::new(Settings::default()).with_fallback_key(Some("  ".into()));
        assert_eq!(blank.model_config_for(FileCategory::Image).api_key, None);
    }
}
