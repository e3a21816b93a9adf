//! Batch orchestrator
//!
//! Owns the entry list and runs "generate names" and "apply changes" over a
//! snapshot of eligible entries, one entry at a time. Every status change is
//! reported through an optional observer callback.

mod ops;

pub use ops::{apply_entry, FileOpError};

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::ai::NameSuggester;
use crate::conversion::ConversionService;
use crate::formats::FileCategory;
use crate::jobs::BatchRun;
use crate::models::{FileEntry, FileStatus, RunMode};
use crate::settings::SettingsHandle;

/// Cooperative cancellation flag, checked between entries
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag before starting a new run
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub enum BatchEvent {
    EntryUpdated { index: usize, entry: FileEntry },
    Progress(BatchRun),
}

pub type EventCallback = Arc<dyn Fn(BatchEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy)]
enum Operation {
    GenerateNames,
    Apply(RunMode),
}

enum Outcome {
    Named(String),
    Applied(PathBuf),
}

pub struct BatchOrchestrator {
    entries: Vec<FileEntry>,
    run: BatchRun,
    settings: SettingsHandle,
    suggester: Arc<dyn NameSuggester>,
    conversions: ConversionService,
    observer: Option<EventCallback>,
}

impl BatchOrchestrator {
    pub fn new(
        settings: SettingsHandle,
        suggester: Arc<dyn NameSuggester>,
        conversions: ConversionService,
    ) -> Self {
        Self {
            entries: Vec::new(),
            run: BatchRun::default(),
            settings,
            suggester,
            conversions,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: EventCallback) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Progress of the current or last run
    pub fn run(&self) -> &BatchRun {
        &self.run
    }

    pub fn is_running(&self) -> bool {
        self.run.running
    }

    fn emit(&self, event: BatchEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    fn emit_entry(&self, index: usize) {
        if let Some(entry) = self.entries.get(index) {
            self.emit(BatchEvent::EntryUpdated {
                index,
                entry: entry.clone(),
            });
        }
    }

    fn emit_progress(&self) {
        self.emit(BatchEvent::Progress(self.run.clone()));
    }

    fn index_of(&self, id: Uuid) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    // ---- list editing ----

    /// Add regular files to the list, skipping anything already present.
    /// New entries start selected. Returns the number added.
    pub fn add_paths<I>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut known: HashSet<PathBuf> = self.entries.iter().map(|e| e.source.clone()).collect();
        let mut added = 0;

        for path in paths {
            if !path.is_file() {
                tracing::debug!(path = %path.display(), "Skipping non-regular file");
                continue;
            }
            let path = std::path::absolute(&path).unwrap_or(path);
            if !known.insert(path.clone()) {
                continue;
            }

            let mut entry = FileEntry::new(path);
            entry.selected = true;
            self.entries.push(entry);
            added += 1;
        }

        added
    }

    pub fn set_proposed_name(&mut self, id: Uuid, name: &str) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.entries[index].set_proposed_name(name);
        self.emit_entry(index);
        true
    }

    pub fn set_target_extension(&mut self, id: Uuid, ext: &str) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.entries[index].set_target_extension(ext);
        self.emit_entry(index);
        true
    }

    pub fn toggle_selection(&mut self, id: Uuid) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };
        self.entries[index].selected = !self.entries[index].selected;
        self.emit_entry(index);
        true
    }

    /// Select everything, or deselect everything if all are selected
    pub fn toggle_select_all(&mut self) {
        let select = !self.entries.iter().all(|e| e.selected);
        for index in 0..self.entries.len() {
            self.entries[index].selected = select;
            self.emit_entry(index);
        }
    }

    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|e| e.selected).count()
    }

    /// Remove selected entries, returning how many were removed
    pub fn remove_selected(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !e.selected);
        before - self.entries.len()
    }

    /// Entries of one category, or all of them
    pub fn filtered(&self, category: Option<FileCategory>) -> Vec<&FileEntry> {
        self.entries
            .iter()
            .filter(|e| category.map_or(true, |c| e.category() == c))
            .collect()
    }

    pub fn category_counts(&self) -> BTreeMap<FileCategory, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.category()).or_insert(0) += 1;
        }
        counts
    }

    // ---- runs ----

    /// Ask the suggester for a name for every selected, pending entry
    pub async fn generate_names(&mut self, token: &CancellationToken) -> BatchRun {
        let indices: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.selected && e.status == FileStatus::Pending)
            .map(|(i, _)| i)
            .collect();

        self.execute(Operation::GenerateNames, indices, token).await
    }

    /// Rename and/or convert every selected entry that has a pending change
    pub async fn apply_changes(&mut self, mode: RunMode, token: &CancellationToken) -> BatchRun {
        let indices: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.selected
                    && e.has_pending_change()
                    && matches!(e.status, FileStatus::Pending | FileStatus::Completed)
            })
            .map(|(i, _)| i)
            .collect();

        // A run cancelled before it starts leaves finished entries alone
        if !token.is_cancelled() {
            for &index in &indices {
                if self.entries[index].status == FileStatus::Completed {
                    self.entries[index].reset_if_finished();
                    self.emit_entry(index);
                }
            }
        }

        self.execute(Operation::Apply(mode), indices, token).await
    }

    async fn execute(
        &mut self,
        operation: Operation,
        indices: Vec<usize>,
        token: &CancellationToken,
    ) -> BatchRun {
        tracing::info!(?operation, entries = indices.len(), "Starting batch run");
        self.run.start(indices.len());
        self.emit_progress();

        for index in indices {
            if token.is_cancelled() {
                break;
            }

            self.entries[index].mark_processing();
            self.emit_entry(index);

            let result = self.process(operation, index).await;

            if token.is_cancelled() {
                // Work already done on disk stays; the entry follows the file
                if let Ok(Outcome::Applied(path)) = result {
                    self.entries[index].relocate(path);
                }
                break;
            }

            let entry = &mut self.entries[index];
            match result {
                Ok(Outcome::Named(name)) => {
                    entry.set_proposed_name(&name);
                    entry.mark_completed();
                }
                Ok(Outcome::Applied(path)) => {
                    entry.relocate(path);
                    entry.mark_completed();
                }
                Err(message) => {
                    tracing::warn!(file = %entry.original_name, error = %message, "Entry failed");
                    entry.mark_failed(&message);
                }
            }
            self.emit_entry(index);

            self.run.complete();
            self.emit_progress();
        }

        self.finish(token)
    }

    async fn process(&self, operation: Operation, index: usize) -> Result<Outcome, String> {
        let entry = &self.entries[index];
        tracing::debug!(file = %entry.original_name, ?operation, "Processing entry");

        match operation {
            Operation::GenerateNames => {
                let config = self.settings.model_config_for(entry.category());
                self.suggester
                    .suggest_name(entry, &config)
                    .await
                    .map(Outcome::Named)
                    .map_err(|e| e.to_string())
            }
            Operation::Apply(mode) => apply_entry(entry, mode, &self.conversions)
                .await
                .map(Outcome::Applied)
                .map_err(|e| e.to_string()),
        }
    }

    fn finish(&mut self, token: &CancellationToken) -> BatchRun {
        if token.is_cancelled() {
            for index in 0..self.entries.len() {
                if self.entries[index].status == FileStatus::Processing {
                    self.entries[index].mark_cancelled();
                    self.emit_entry(index);
                }
            }
            tracing::info!(
                completed = self.run.completed_count,
                total = self.run.total_count,
                "Batch run cancelled"
            );
        } else {
            tracing::info!(
                completed = self.run.completed_count,
                total = self.run.total_count,
                "Batch run finished"
            );
        }

        self.run.stop();
        self.emit_progress();
        self.run.clone()
    }
}
