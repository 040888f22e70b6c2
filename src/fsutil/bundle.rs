//! Grouping of discovered files by their containing directory.

use std::ops::Range;
use std::path::{Path, PathBuf};

/// Splits `files` (sorted, relative to `base_dir`) into contiguous runs that
/// share the same parent directory and calls `visit` with the index range of
/// each run, in order.
///
/// The first error returned by `visit` stops the iteration and is returned.
/// Every index of `files` is part of exactly one emitted range; an empty
/// input emits nothing.
pub fn bundle_files<E, F>(base_dir: &Path, files: &[PathBuf], mut visit: F) -> Result<(), E>
where
    F: FnMut(Range<usize>) -> Result<(), E>,
{
    let parent_of = |file: &PathBuf| -> PathBuf {
        base_dir
            .join(file)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    };

    let mut start = 0;
    let mut current: Option<PathBuf> = None;

    for (index, file) in files.iter().enumerate() {
        let dir = parent_of(file);
        match &current {
            Some(anchor) if *anchor != dir => {
                visit(start..index)?;
                start = index;
                current = Some(dir);
            }
            Some(_) => {}
            None => current = Some(dir),
        }
    }

    if start < files.len() {
        visit(start..files.len())?;
    }

    Ok(())
}

/// Collects the ranges emitted by [`bundle_files`].
pub fn bundle_ranges(base_dir: &Path, files: &[PathBuf]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let _ = bundle_files::<(), _>(base_dir, files, |range| {
        ranges.push(range);
        Ok(())
    });
    ranges
}
