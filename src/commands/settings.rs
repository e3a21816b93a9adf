use clap::Subcommand;

use crate::ai::AiModel;
use crate::formats::FileCategory;
use crate::settings::{Settings, SettingsHandle};

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the current settings
    Show,

    /// Store the API key for a model
    SetKey { model: String, key: String },

    /// Set the default model
    SetModel { model: String },

    /// Set the naming prompt for a file category
    SetPrompt { category: String, text: String },
}

fn parse_model(name: &str) -> Result<AiModel, String> {
    AiModel::parse(name).ok_or_else(|| {
        let known: Vec<&str> = AiModel::ALL.iter().map(|m| m.id()).collect();
        format!("Unknown model '{}', expected one of: {}", name, known.join(", "))
    })
}

fn parse_category(name: &str) -> Result<FileCategory, String> {
    FileCategory::parse(name).ok_or_else(|| {
        let known: Vec<&str> = FileCategory::ALL.iter().map(|c| c.as_str()).collect();
        format!("Unknown category '{}', expected one of: {}", name, known.join(", "))
    })
}

/// Show only the last four characters of a key
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{}", tail)
}

fn render(settings: &Settings) -> String {
    let mut lines = vec![
        format!("Appearance:       {:?}", settings.appearance_mode),
        format!("Launch at login:  {}", settings.launch_at_login),
        format!("Default model:    {}", settings.ai_model),
        format!("Temperature:      {}", settings.temperature),
    ];

    lines.push("API keys:".to_string());
    if settings.api_keys.is_empty() {
        lines.push("  (none)".to_string());
    }
    for (model, key) in &settings.api_keys {
        lines.push(format!("  {}: {}", model.id(), mask_key(key)));
    }

    if !settings.conversion_models.is_empty() {
        lines.push("Model overrides:".to_string());
        for (category, model) in &settings.conversion_models {
            lines.push(format!("  {}: {}", category, model.id()));
        }
    }

    lines.push("Prompts:".to_string());
    for (category, prompt) in &settings.prompt_templates {
        lines.push(format!("  {}: {}", category, prompt));
    }

    lines.push(format!(
        "Conversion rules: {} ({} implemented)",
        settings.format_conversions.len(),
        settings.implemented_conversions().count()
    ));
    lines.push(format!("Rename rules:     {}", settings.rename_rules.len()));

    lines.join("\n")
}

pub fn handle(settings: &SettingsHandle, action: SettingsAction) -> Result<(), String> {
    match action {
        SettingsAction::Show => {
            println!("{}", render(&settings.snapshot()));
            Ok(())
        }
        SettingsAction::SetKey { model, key } => {
            let model = parse_model(&model)?;
            let key = key.trim().to_string();
            settings
                .update(|s| {
                    if key.is_empty() {
                        s.api_keys.remove(&model);
                    } else {
                        s.api_keys.insert(model, key);
                    }
                })
                .map_err(|e| format!("Failed to save settings: {}", e))?;
            tracing::info!(model = model.id(), "Updated API key");
            Ok(())
        }
        SettingsAction::SetModel { model } => {
            let model = parse_model(&model)?;
            settings
                .update(|s| s.ai_model = model)
                .map_err(|e| format!("Failed to save settings: {}", e))
        }
        SettingsAction::SetPrompt { category, text } => {
            let category = parse_category(&category)?;
            settings
                .update(|s| {
                    s.prompt_templates.insert(category, text);
                })
                .map_err(|e| format!("Failed to save settings: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PreferenceStore;
    use tempfile::TempDir;

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("AIzaSyExample1234"), "****1234");
        assert_eq!(mask_key("abc"), "****");
    }

    #[test]
    fn test_render_hides_keys() {
        let mut settings = Settings::default();
        settings.api_keys.insert(AiModel::GeminiPro, "super-secret-9876".to_string());

        let text = render(&settings);
        assert!(text.contains("gemini-pro: ****9876"));
        assert!(!text.contains("super-secret"));
    }

    #[test]
    fn test_set_commands_persist() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("prefs.json");
        let settings = SettingsHandle::load(PreferenceStore::new(&path));

        handle(&settings, SettingsAction::SetModel { model: "GPT-4".into() }).unwrap();
        handle(
            &settings,
            SettingsAction::SetKey {
                model: "gpt-4".into(),
                key: " sk-123 ".into(),
            },
        )
        .unwrap();
        handle(
            &settings,
            SettingsAction::SetPrompt {
                category: "audio".into(),
                text: "Name this recording".into(),
            },
        )
        .unwrap();

        let stored = PreferenceStore::new(&path).load_settings();
        assert_eq!(stored.ai_model, AiModel::Gpt4);
        assert_eq!(stored.api_keys[&AiModel::Gpt4], "sk-123");
        assert_eq!(stored.prompt_templates[&FileCategory::Audio], "Name this recording");
    }

    #[test]
    fn test_unknown_names_are_rejected() {
        let settings = SettingsHandle::new(Settings::default());
        let err = handle(&settings, SettingsAction::SetModel { model: "gpt-5".into() }).unwrap_err();
        assert!(err.contains("gemini-pro"));
        assert!(handle(
            &settings,
            SettingsAction::SetPrompt {
                category: "spreadsheet".into(),
                text: "x".into()
            }
        )
        .is_err());
    }
}
