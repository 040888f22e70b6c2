//! File and folder primitives used by the placement engine.

use crate::error::{LibraryError, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Copy `src` to `dst`, truncating `dst`, and flush it to durable storage
/// before returning. A partially written `dst` is left for the caller.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let mut reader = File::open(src).map_err(|e| LibraryError::io(src, e))?;
    let mut writer = File::create(dst).map_err(|e| LibraryError::io(dst, e))?;
    io::copy(&mut reader, &mut writer).map_err(|e| LibraryError::io(dst, e))?;
    writer.sync_all().map_err(|e| LibraryError::io(dst, e))?;
    Ok(())
}

fn file_size(path: &Path) -> io::Result<u64> {
    File::open(path)?.metadata().map(|m| m.len())
}

/// True if `dst` does not exist, or `src` exists and is larger than `dst`.
/// False whenever `src` can't be opened.
pub fn is_larger(src: &Path, dst: &Path) -> bool {
    let Ok(src_size) = file_size(src) else {
        return false;
    };
    match file_size(dst) {
        Ok(dst_size) => src_size > dst_size,
        Err(_) => true,
    }
}

/// Returns the smallest (or largest) file of `files` by byte size.
///
/// Files that can't be opened are ignored; on equal sizes the earlier entry
/// wins. Fails with [`LibraryError::NotFound`] if nothing could be opened.
pub fn nth_file_size(files: &[PathBuf], smallest: bool) -> Result<PathBuf> {
    let mut found: Option<(&PathBuf, u64)> = None;

    for path in files {
        let Ok(size) = file_size(path) else {
            continue;
        };
        let better = match found {
            None => true,
            Some((_, best)) if smallest => size < best,
            Some((_, best)) => size > best,
        };
        if better {
            found = Some((path, size));
        }
    }

    found
        .map(|(path, _)| path.clone())
        .ok_or_else(|| LibraryError::NotFound(files.first().cloned().unwrap_or_default()))
}

/// First of `dst (1)`, `dst (2)`, ... that does not exist yet.
fn numbered_sibling(dst: &Path) -> PathBuf {
    let mut base = dst.as_os_str().to_os_string();
    base.push(" (");
    (1u32..)
        .map(|n| {
            let mut candidate = base.clone();
            candidate.push(format!("{})", n));
            PathBuf::from(candidate)
        })
        .find(|candidate| fs::symlink_metadata(candidate).is_err())
        .unwrap_or_else(|| dst.to_path_buf())
}

fn create_parent_dirs(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o777);
    }
    builder.create(dir)
}

/// Rename folder `src` to `dst`. If `dst` already exists, the first free
/// `dst (N)` is used instead. Missing parents of the target are created.
///
/// The rename is a single `rename(2)`: moving across filesystems fails with
/// [`LibraryError::Io`] and is not retried as copy + delete.
pub fn rename_folder(src: &Path, dst: &Path) -> Result<PathBuf> {
    let target = if fs::symlink_metadata(dst).is_ok() {
        numbered_sibling(dst)
    } else {
        dst.to_path_buf()
    };

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_parent_dirs(parent).map_err(|e| LibraryError::io(parent, e))?;
    }

    fs::rename(src, &target).map_err(|e| LibraryError::io(src, e))?;
    Ok(target)
}
