use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::formats::{category_of, normalize_extension, FileCategory};

/// Message recorded on entries reverted by a cancelled run
pub const CANCELLED_MESSAGE: &str = "Cancelled";

/// Processing status of a file entry
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Waiting to be processed
    #[default]
    Pending,
    /// Currently being processed by a run
    Processing,
    /// Processed successfully
    Completed,
    /// Processing failed, see `last_error`
    Error,
}

impl FileStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Error => "error",
        }
    }

    /// Completed or Error
    pub fn is_finished(self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Error)
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to the original file when changes are applied
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Write a new file and keep the original
    CreateNew,
    /// Replace the original
    #[default]
    Replace,
}

/// One file in the batch list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: Uuid,
    /// Absolute path of the file on disk
    pub source: PathBuf,
    /// File name including extension
    pub original_name: String,
    /// New base name, without extension
    pub proposed_name: Option<String>,
    /// Target extension; empty keeps the current one
    pub target_extension: String,
    pub status: FileStatus,
    pub last_error: Option<String>,
    pub selected: bool,
}

impl FileEntry {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let original_name = file_name_of(&source);

        Self {
            id: Uuid::new_v4(),
            source,
            original_name,
            proposed_name: None,
            target_extension: String::new(),
            status: FileStatus::Pending,
            last_error: None,
            selected: false,
        }
    }

    /// Current extension, normalized
    pub fn extension(&self) -> String {
        self.source
            .extension()
            .and_then(|e| e.to_str())
            .map(normalize_extension)
            .unwrap_or_default()
    }

    /// Current file name without extension
    pub fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn category(&self) -> FileCategory {
        category_of(&self.extension())
    }

    /// Whether applying changes would do anything
    pub fn has_pending_change(&self) -> bool {
        self.proposed_name.is_some() || !self.target_extension.is_empty()
    }

    pub fn set_proposed_name(&mut self, name: &str) {
        let name = name.trim();
        self.proposed_name = if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        };
        self.reset_if_finished();
    }

    pub fn set_target_extension(&mut self, ext: &str) {
        self.target_extension = normalize_extension(ext);
        self.reset_if_finished();
    }

    /// Completed/Error → Pending; used when the user edits the entry
    pub fn reset_if_finished(&mut self) {
        if self.status.is_finished() {
            self.status = FileStatus::Pending;
            self.last_error = None;
        }
    }

    pub fn mark_processing(&mut self) {
        debug_assert_eq!(self.status, FileStatus::Pending);
        self.status = FileStatus::Processing;
    }

    pub fn mark_completed(&mut self) {
        self.status = FileStatus::Completed;
        self.last_error = None;
    }

    pub fn mark_failed(&mut self, error: &str) {
        self.status = FileStatus::Error;
        self.last_error = Some(error.to_string());
    }

    /// Processing → Pending after a cancelled run
    pub fn mark_cancelled(&mut self) {
        if self.status == FileStatus::Processing {
            self.status = FileStatus::Pending;
            self.last_error = Some(CANCELLED_MESSAGE.to_string());
        }
    }

    /// Point the entry at the file an apply produced and drop the edits
    /// that have now been carried out.
    pub fn relocate(&mut self, path: PathBuf) {
        self.original_name = file_name_of(&path);
        self.source = path;
        self.proposed_name = None;
        self.target_extension.clear();
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_defaults() {
        let entry = FileEntry::new("/tmp/Photos/Cat.JPG");
        assert_eq!(entry.original_name, "Cat.JPG");
        assert_eq!(entry.extension(), "jpg");
        assert_eq!(entry.stem(), "Cat");
        assert_eq!(entry.category(), FileCategory::Image);
        assert_eq!(entry.status, FileStatus::Pending);
        assert!(!entry.selected);
        assert!(!entry.has_pending_change());
    }

    #[test]
    fn test_editing_resets_finished_entries() {
        let mut entry = FileEntry::new("/tmp/a.txt");
        entry.mark_processing();
        entry.mark_completed();

        entry.set_proposed_name("meeting-summary");
        assert_eq!(entry.status, FileStatus::Pending);
        assert_eq!(entry.proposed_name.as_deref(), Some("meeting-summary"));

        entry.mark_processing();
        entry.mark_failed("boom");
        entry.set_target_extension(".MD");
        assert_eq!(entry.status, FileStatus::Pending);
        assert_eq!(entry.target_extension, "md");
        assert!(entry.last_error.is_none());
    }

    #[test]
    fn test_blank_proposed_name_clears_it() {
        let mut entry = FileEntry::new("/tmp/a.txt");
        entry.set_proposed_name("  ");
        assert!(entry.proposed_name.is_none());
    }

    #[test]
    fn test_cancel_only_touches_processing() {
        let mut entry = FileEntry::new("/tmp/a.txt");
        entry.mark_cancelled();
        assert_eq!(entry.status, FileStatus::Pending);
        assert!(entry.last_error.is_none());

        entry.mark_processing();
        entry.mark_cancelled();
        assert_eq!(entry.status, FileStatus::Pending);
        assert_eq!(entry.last_error.as_deref(), Some(CANCELLED_MESSAGE));
    }

    #[test]
    fn test_relocate_clears_edits() {
        let mut entry = FileEntry::new("/tmp/cat.jpg");
        entry.set_proposed_name("kitten");
        entry.set_target_extension("png");

        entry.relocate(PathBuf::from("/tmp/kitten.png"));
        assert_eq!(entry.original_name, "kitten.png");
        assert!(!entry.has_pending_change());
    }
}
