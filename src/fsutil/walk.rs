//! Recursive discovery of files by extension.

use crate::error::{LibraryError, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Audio extensions, kept sorted for binary search.
pub const AUDIO_EXTS: &[&str] = &["flac", "m4a", "mp3", "mp4", "shn", "wav"];

/// Image extensions, kept sorted for binary search.
pub const IMAGE_EXTS: &[&str] = &["jpeg", "jpg", "png"];

/// Check whether `path` has one of `exts` as its final suffix, ignoring case.
/// `exts` must be sorted and lowercase.
pub fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .map(|e| exts.binary_search(&e.as_str()).is_ok())
        .unwrap_or(false)
}

/// Returns all regular files below `root` whose extension is in `exts`, as
/// paths relative to `root`, sorted by the bytes of the relative path.
///
/// Directories and symlinks are skipped. Entries that can't be read are
/// skipped too; only a root that can't be read is an error.
pub fn list_by_extension(root: &Path, exts: &[&str]) -> Result<Vec<PathBuf>> {
    let meta = std::fs::metadata(root).map_err(|e| LibraryError::Walk {
        root: root.to_path_buf(),
        message: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(LibraryError::Walk {
            root: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry under {:?}: {}", root, e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !has_extension(entry.path(), exts) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }

    files.sort_by(|a, b| {
        a.as_os_str()
            .as_encoded_bytes()
            .cmp(b.as_os_str().as_encoded_bytes())
    });
    Ok(files)
}

/// All nested audio files of `dir`, or an empty list if `dir` can't be walked.
pub fn list_audio(dir: &Path) -> Vec<PathBuf> {
    list_by_extension(dir, AUDIO_EXTS).unwrap_or_default()
}

/// All nested image files of `dir`, or an empty list if `dir` can't be walked.
pub fn list_image(dir: &Path) -> Vec<PathBuf> {
    list_by_extension(dir, IMAGE_EXTS).unwrap_or_default()
}
