use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

use crate::ai::GeminiNamingClient;
use crate::batch::{BatchEvent, BatchOrchestrator, CancellationToken, EventCallback};
use crate::conversion::ConversionService;
use crate::jobs::{format_duration, BatchRun};
use crate::models::{FileEntry, FileStatus, RunMode};
use crate::settings::SettingsHandle;

/// Options of the `apply` command
#[derive(Debug, Clone, Default)]
pub struct ApplyRequest {
    pub name: Option<String>,
    pub ext: Option<String>,
    pub mode: RunMode,
    pub suggest: bool,
}

#[derive(Debug, Clone, Copy)]
enum Step {
    GenerateNames,
    Apply(RunMode),
}

/// Files named on the command line. Directories contribute their regular
/// files, without descending into subdirectories.
pub fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let children = WalkDir::new(path)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path());
            files.extend(children);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            tracing::warn!(path = %path.display(), "Skipping missing path");
        }
    }

    files
}

fn progress_printer() -> EventCallback {
    Arc::new(|event| {
        if let BatchEvent::Progress(run) = event {
            if run.running && run.completed_count > 0 {
                let eta = run
                    .estimated_remaining
                    .map(|d| format!(", about {} left", format_duration(d)))
                    .unwrap_or_default();
                eprintln!("[{}/{}]{}", run.completed_count, run.total_count, eta);
            }
        }
    })
}

fn build_orchestrator(settings: SettingsHandle, paths: &[PathBuf]) -> Result<BatchOrchestrator, String> {
    let mut orchestrator = BatchOrchestrator::new(
        settings,
        Arc::new(GeminiNamingClient::new()),
        ConversionService::new(),
    )
    .with_observer(progress_printer());

    let files = expand_paths(paths);
    if orchestrator.add_paths(files) == 0 {
        return Err("No files to process".to_string());
    }
    Ok(orchestrator)
}

/// Run `steps` on a worker task. Ctrl-C cancels at the next entry boundary.
async fn run_steps(
    mut orchestrator: BatchOrchestrator,
    steps: Vec<Step>,
) -> Result<(BatchOrchestrator, Vec<BatchRun>), String> {
    let token = CancellationToken::new();

    let signal_token = token.clone();
    let signal_watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current file...");
            signal_token.cancel();
        }
    });

    let worker_token = token.clone();
    let worker = tokio::spawn(async move {
        let mut runs = Vec::with_capacity(steps.len());
        for step in steps {
            if worker_token.is_cancelled() {
                break;
            }
            let run = match step {
                Step::GenerateNames => orchestrator.generate_names(&worker_token).await,
                Step::Apply(mode) => orchestrator.apply_changes(mode, &worker_token).await,
            };
            runs.push(run);
        }
        (orchestrator, runs)
    });

    let result = worker
        .await
        .map_err(|e| format!("Batch task failed: {}", e));
    signal_watcher.abort();

    if token.is_cancelled() {
        tracing::info!("Batch cancelled by user");
    }
    result
}

fn describe(entry: &FileEntry, step: Step) -> String {
    match (entry.status, step) {
        (FileStatus::Error, _) => format!(
            "{}: error: {}",
            entry.original_name,
            entry.last_error.as_deref().unwrap_or("unknown error")
        ),
        (FileStatus::Completed, Step::GenerateNames) => format!(
            "{} -> {}",
            entry.original_name,
            entry.proposed_name.as_deref().unwrap_or_default()
        ),
        (FileStatus::Completed, Step::Apply(_)) => format!("{}", entry.source.display()),
        (status, _) => match &entry.last_error {
            Some(reason) => format!("{}: {} ({})", entry.original_name, status, reason),
            None => format!("{}: {}", entry.original_name, status),
        },
    }
}

fn report(orchestrator: &BatchOrchestrator, step: Step) -> Result<(), String> {
    for entry in orchestrator.entries() {
        println!("{}", describe(entry, step));
    }

    let failed = orchestrator
        .entries()
        .iter()
        .filter(|e| e.status == FileStatus::Error)
        .count();
    if failed > 0 {
        return Err(format!(
            "{} of {} files failed",
            failed,
            orchestrator.entries().len()
        ));
    }
    Ok(())
}

pub async fn suggest(settings: SettingsHandle, paths: Vec<PathBuf>) -> Result<(), String> {
    let orchestrator = build_orchestrator(settings, &paths)?;
    let (orchestrator, _runs) = run_steps(orchestrator, vec![Step::GenerateNames]).await?;
    report(&orchestrator, Step::GenerateNames)
}

pub async fn apply(
    settings: SettingsHandle,
    paths: Vec<PathBuf>,
    request: ApplyRequest,
) -> Result<(), String> {
    let mut orchestrator = build_orchestrator(settings, &paths)?;

    if request.name.is_some() && orchestrator.entries().len() > 1 {
        return Err("--name can only be used with a single file".to_string());
    }
    if request.name.is_none() && request.ext.is_none() && !request.suggest {
        return Err("Nothing to do: pass --name, --ext or --suggest".to_string());
    }

    let ids: Vec<_> = orchestrator.entries().iter().map(|e| e.id).collect();
    for id in ids {
        if let Some(name) = &request.name {
            orchestrator.set_proposed_name(id, name);
        }
        if let Some(ext) = &request.ext {
            orchestrator.set_target_extension(id, ext);
        }
    }

    let mut steps = Vec::new();
    if request.suggest {
        steps.push(Step::GenerateNames);
    }
    steps.push(Step::Apply(request.mode));

    let (orchestrator, _runs) = run_steps(orchestrator, steps).await?;
    report(&orchestrator, Step::Apply(request.mode))
}
