//! Command-line surface over the library API

pub mod batch;
pub mod settings;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::conversion::ConversionService;
use crate::formats::category_of;
use crate::models::RunMode;
use crate::settings::{PreferenceStore, SettingsHandle, API_KEY_ENV};

use self::settings::SettingsAction;

#[derive(Parser)]
#[command(name = "maybe-f2")]
#[command(author, version, long_about = None)]
#[command(about = "Batch rename and convert files, with AI-suggested names")]
pub struct Cli {
    /// Preference file to read settings from (defaults to the user config dir)
    #[arg(long, global = true)]
    pub prefs: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Keep the original file
    CreateNew,
    /// Replace the original file
    Replace,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::CreateNew => RunMode::CreateNew,
            ModeArg::Replace => RunMode::Replace,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask the configured model for a name for each file
    Suggest {
        /// Files or directories (directories contribute their files)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Rename and/or convert files
    Apply {
        /// Files or directories (directories contribute their files)
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// New base name (single file only)
        #[arg(short, long)]
        name: Option<String>,

        /// Target extension
        #[arg(short, long)]
        ext: Option<String>,

        #[arg(short, long, value_enum, default_value = "replace")]
        mode: ModeArg,

        /// Generate names with the model before applying
        #[arg(short, long)]
        suggest: bool,
    },

    /// Convert one file to another format
    Convert {
        path: PathBuf,

        /// Target extension
        #[arg(long)]
        to: String,
    },

    /// Print the category of an extension
    Category { ext: String },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

fn open_settings(prefs: Option<PathBuf>) -> Result<SettingsHandle, String> {
    let store = match prefs {
        Some(path) => PreferenceStore::new(path),
        None => PreferenceStore::open_default().map_err(|e| e.to_string())?,
    };
    tracing::debug!(path = %store.path().display(), "Using preference file");

    Ok(SettingsHandle::load(store).with_fallback_key(std::env::var(API_KEY_ENV).ok()))
}

pub async fn dispatch(cli: Cli) -> Result<(), String> {
    match cli.command {
        Commands::Suggest { paths } => {
            let settings = open_settings(cli.prefs)?;
            batch::suggest(settings, paths).await
        }
        Commands::Apply {
            paths,
            name,
            ext,
            mode,
            suggest,
        } => {
            let settings = open_settings(cli.prefs)?;
            let request = batch::ApplyRequest {
                name,
                ext,
                mode: mode.into(),
                suggest,
            };
            batch::apply(settings, paths, request).await
        }
        Commands::Convert { path, to } => convert(path, &to).await,
        Commands::Category { ext } => {
            println!("{}", category_of(&ext));
            Ok(())
        }
        Commands::Settings { action } => {
            let handle = open_settings(cli.prefs)?;
            settings::handle(&handle, action)
        }
    }
}

async fn convert(path: PathBuf, target_ext: &str) -> Result<(), String> {
    let output = ConversionService::new()
        .convert_to(&path, target_ext)
        .await
        .map_err(|e| format!("Failed to convert {}: {}", path.display(), e))?;

    println!("{}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from([
            "maybe-f2", "apply", "a.png", "--ext", "jpg", "--mode", "create-new", "--suggest",
        ])
        .unwrap();

        match cli.command {
            Commands::Apply {
                paths,
                ext,
                mode,
                suggest,
                name,
            } => {
                assert_eq!(paths, vec![PathBuf::from("a.png")]);
                assert_eq!(ext.as_deref(), Some("jpg"));
                assert_eq!(RunMode::from(mode), RunMode::CreateNew);
                assert!(suggest);
                assert_eq!(name, None);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_apply_defaults_to_replace() {
        let cli = Cli::try_parse_from(["maybe-f2", "--prefs", "p.json", "apply", "a.txt", "-n", "x"]).unwrap();
        assert_eq!(cli.prefs, Some(PathBuf::from("p.json")));
        assert!(matches!(cli.command, Commands::Apply { mode: ModeArg::Replace, .. }));
    }

    #[test]
    fn test_suggest_requires_paths() {
        assert!(Cli::try_parse_from(["maybe-f2", "suggest"]).is_err());
    }

    #[tokio::test]
    async fn test_convert_command() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("dot.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([0, 0, 0])).save(&path).unwrap();

        convert(path, "tiff").await.unwrap();
        assert!(temp_dir.path().join("dot_converted.tiff").exists());
    }
}
