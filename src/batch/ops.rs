//! Filesystem side of "apply changes" for a single entry

use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::conversion::{ConversionError, ConversionService};
use crate::formats::normalize_extension;
use crate::models::{FileEntry, RunMode};

#[derive(Debug, Error)]
pub enum FileOpError {
    #[error("Source file no longer exists: {0}")]
    SourceMissing(PathBuf),
    #[error("A file named {0} already exists")]
    TargetExists(String),
    #[error("Folder is not writable: {0}")]
    FolderNotWritable(PathBuf),
    #[error("Not enough free disk space: need {needed} bytes, {available} available")]
    InsufficientSpace { needed: u64, available: u64 },
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// `dir` must allow creating files, checked by creating and dropping a
/// scratch file.
async fn ensure_writable(dir: &Path) -> Result<(), FileOpError> {
    let metadata = fs::metadata(dir).await?;
    if metadata.permissions().readonly() {
        return Err(FileOpError::FolderNotWritable(dir.to_path_buf()));
    }

    if let Err(e) = tempfile::NamedTempFile::new_in(dir) {
        tracing::debug!(dir = %dir.display(), error = %e, "Cannot create files in folder");
        return Err(FileOpError::FolderNotWritable(dir.to_path_buf()));
    }
    Ok(())
}

/// Require twice the file size free in `dir`. Skipped when the free space
/// cannot be determined.
fn ensure_space(dir: &Path, file_size: u64) -> Result<(), FileOpError> {
    let needed = file_size.saturating_mul(2);
    match fs2::available_space(dir) {
        Ok(available) if available < needed => {
            Err(FileOpError::InsufficientSpace { needed, available })
        }
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Could not determine free space");
            Ok(())
        }
    }
}

/// Carry out the entry's pending rename and/or conversion.
///
/// Returns the path of the file that now holds the entry's content.
pub async fn apply_entry(
    entry: &FileEntry,
    mode: RunMode,
    conversions: &ConversionService,
) -> Result<PathBuf, FileOpError> {
    let source = entry.source.as_path();
    if !fs::try_exists(source).await.unwrap_or(false) {
        return Err(FileOpError::SourceMissing(source.to_path_buf()));
    }

    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    let base = entry.proposed_name.clone().unwrap_or_else(|| entry.stem());
    let current_ext = entry.extension();
    let target_ext = normalize_extension(&entry.target_extension);

    if !target_ext.is_empty() && target_ext != current_ext {
        convert_and_move(entry, mode, conversions, dir, &base, &target_ext).await
    } else {
        rename_only(source, mode, dir, &base).await
    }
}

async fn convert_and_move(
    entry: &FileEntry,
    mode: RunMode,
    conversions: &ConversionService,
    dir: &Path,
    base: &str,
    target_ext: &str,
) -> Result<PathBuf, FileOpError> {
    let source = entry.source.as_path();

    ensure_writable(dir).await?;
    let size = fs::metadata(source).await?.len();
    ensure_space(dir, size)?;

    let converted = conversions.convert_to(source, target_ext).await?;
    let destination = dir.join(format!("{}.{}", base, target_ext));

    if fs::try_exists(&destination).await.unwrap_or(false) {
        if let Err(e) = fs::remove_file(&converted).await {
            tracing::warn!(path = %converted.display(), error = %e, "Failed to remove intermediate file");
        }
        return Err(FileOpError::TargetExists(display_name(&destination)));
    }

    move_into_place(&converted, &destination).await?;

    if mode == RunMode::Replace && fs::try_exists(&destination).await.unwrap_or(false) {
        if let Err(e) = fs::remove_file(source).await {
            tracing::warn!(path = %source.display(), error = %e, "Converted file written but original could not be removed");
        }
    }

    tracing::debug!(from = %source.display(), to = %destination.display(), "Converted file");
    Ok(destination)
}

/// Rename the `_converted` output to its final name, removing it if that fails
async fn move_into_place(converted: &Path, destination: &Path) -> Result<(), FileOpError> {
    if let Err(e) = fs::rename(converted, destination).await {
        if let Err(cleanup) = fs::remove_file(converted).await {
            tracing::warn!(path = %converted.display(), error = %cleanup, "Failed to remove intermediate file");
        }
        return Err(e.into());
    }
    Ok(())
}

async fn rename_only(
    source: &Path,
    mode: RunMode,
    dir: &Path,
    base: &str,
) -> Result<PathBuf, FileOpError> {
    // The on-disk extension is kept as-is, including its case
    let file_name = match source.extension() {
        Some(ext) => format!("{}.{}", base, ext.to_string_lossy()),
        None => base.to_string(),
    };
    let destination = dir.join(file_name);

    if destination == source {
        return Ok(destination);
    }
    if fs::try_exists(&destination).await.unwrap_or(false) {
        return Err(FileOpError::TargetExists(display_name(&destination)));
    }
    ensure_writable(dir).await?;

    match mode {
        RunMode::CreateNew => {
            fs::copy(source, &destination).await?;
        }
        RunMode::Replace => {
            fs::rename(source, &destination).await?;
        }
    }

    tracing::debug!(from = %source.display(), to = %destination.display(), ?mode, "Renamed file");
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_png(path: &Path) {
        RgbImage::from_pixel(4, 4, Rgb([10, 200, 30])).save(path).unwrap();
    }

    #[tokio::test]
    async fn test_rename_replace_moves_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("note.txt");
        std::fs::write(&source, "hello").unwrap();

        let mut entry = FileEntry::new(&source);
        entry.set_proposed_name("meeting-summary");

        let result = apply_entry(&entry, RunMode::Replace, &ConversionService::new())
            .await
            .unwrap();

        assert_eq!(result, temp_dir.path().join("meeting-summary.txt"));
        assert!(result.exists());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_rename_create_new_copies_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("note.txt");
        std::fs::write(&source, "hello").unwrap();

        let mut entry = FileEntry::new(&source);
        entry.set_proposed_name("meeting-summary");

        let result = apply_entry(&entry, RunMode::CreateNew, &ConversionService::new())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&result).unwrap(), "hello");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_rename_onto_existing_file_fails() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("a.txt");
        std::fs::write(&source, "a").unwrap();
        std::fs::write(temp_dir.path().join("b.txt"), "b").unwrap();

        let mut entry = FileEntry::new(&source);
        entry.set_proposed_name("b");

        let err = apply_entry(&entry, RunMode::Replace, &ConversionService::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FileOpError::TargetExists(ref name) if name == "b.txt"));
        assert_eq!(std::fs::read_to_string(temp_dir.path().join("b.txt")).unwrap(), "b");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let mut entry = FileEntry::new(temp_dir.path().join("gone.txt"));
        entry.set_proposed_name("new");

        let err = apply_entry(&entry, RunMode::Replace, &ConversionService::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FileOpError::SourceMissing(_)));
    }

    #[tokio::test]
    async fn test_convert_replace_removes_original() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("cat.png");
        write_png(&source);

        let mut entry = FileEntry::new(&source);
        entry.set_target_extension("jpg");

        let result = apply_entry(&entry, RunMode::Replace, &ConversionService::new())
            .await
            .unwrap();

        assert_eq!(result, temp_dir.path().join("cat.jpg"));
        assert!(image::open(&result).is_ok());
        assert!(!source.exists());
        assert!(!temp_dir.path().join("cat_converted.jpg").exists());
    }

    #[tokio::test]
    async fn test_convert_with_new_name_create_new_keeps_original() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("IMG_0001.png");
        write_png(&source);

        let mut entry = FileEntry::new(&source);
        entry.set_proposed_name("green-square");
        entry.set_target_extension(".GIF");

        let result = apply_entry(&entry, RunMode::CreateNew, &ConversionService::new())
            .await
            .unwrap();

        assert_eq!(result, temp_dir.path().join("green-square.gif"));
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_convert_onto_existing_target_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("cat.png");
        write_png(&source);
        std::fs::write(temp_dir.path().join("cat.jpg"), "occupied").unwrap();

        let mut entry = FileEntry::new(&source);
        entry.set_target_extension("jpg");

        let err = apply_entry(&entry, RunMode::Replace, &ConversionService::new())
            .await
            .unwrap_err();

        assert!(matches!(err, FileOpError::TargetExists(_)));
        assert!(source.exists());
        assert!(!temp_dir.path().join("cat_converted.jpg").exists());
        assert_eq!(std::fs::read_to_string(temp_dir.path().join("cat.jpg")).unwrap(), "occupied");
    }

    #[tokio::test]
    async fn test_unsupported_conversion() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("note.txt");
        std::fs::write(&source, "text").unwrap();

        let mut entry = FileEntry::new(&source);
        entry.set_target_extension("mp3");

        let err = apply_entry(&entry, RunMode::Replace, &ConversionService::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FileOpError::Conversion(ConversionError::UnsupportedFormat { .. })
        ));
        assert!(source.exists());
    }

    #[test]
    fn test_space_check() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ensure_space(temp_dir.path(), 1).is_ok());

        let err = ensure_space(temp_dir.path(), u64::MAX / 2).unwrap_err();
        assert!(matches!(err, FileOpError::InsufficientSpace { needed, .. } if needed == u64::MAX - 1));
    }

    #[cfg(unix)]
    fn set_mode(path: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rename_in_read_only_folder() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("ro");
        std::fs::create_dir(&folder).unwrap();
        let source = folder.join("note.txt");
        std::fs::write(&source, "text").unwrap();
        set_mode(&folder, 0o555);

        let mut entry = FileEntry::new(&source);
        entry.set_proposed_name("renamed");
        let result = apply_entry(&entry, RunMode::Replace, &ConversionService::new()).await;

        set_mode(&folder, 0o755);
        assert!(matches!(result, Err(FileOpError::FolderNotWritable(ref dir)) if dir == &folder));
        assert!(source.exists());
        assert!(!folder.join("renamed.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_in_read_only_folder() {
        let temp_dir = TempDir::new().unwrap();
        let folder = temp_dir.path().join("ro");
        std::fs::create_dir(&folder).unwrap();
        let source = folder.join("cat.png");
        write_png(&source);
        set_mode(&folder, 0o555);

        let mut entry = FileEntry::new(&source);
        entry.set_target_extension("jpg");
        let result = apply_entry(&entry, RunMode::Replace, &ConversionService::new()).await;

        set_mode(&folder, 0o755);
        assert!(matches!(result, Err(FileOpError::FolderNotWritable(_))));
        assert_eq!(std::fs::read_dir(&folder).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_move_removes_intermediate_file() {
        let temp_dir = TempDir::new().unwrap();
        let converted = temp_dir.path().join("cat_converted.jpg");
        std::fs::write(&converted, b"jpeg").unwrap();

        let destination = temp_dir.path().join("gone").join("cat.jpg");
        let err = move_into_place(&converted, &destination).await.unwrap_err();

        assert!(matches!(err, FileOpError::Io(_)));
        assert!(!converted.exists());
        assert!(!destination.exists());
    }

    #[tokio::test]
    async fn test_writable_folder_check_leaves_nothing_behind() {
        let temp_dir = TempDir::new().unwrap();
        ensure_writable(temp_dir.path()).await.unwrap();
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_same_name_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("note.txt");
        std::fs::write(&source, "text").unwrap();

        let mut entry = FileEntry::new(&source);
        entry.set_proposed_name("note");

        let result = apply_entry(&entry, RunMode::Replace, &ConversionService::new())
            .await
            .unwrap();
        assert_eq!(result, source);
        assert!(source.exists());
    }
}
