//! Conflict-resolving placement of a produced bundle into the library.
//!
//! A bundle is merged into its destination folder track by track: tracks the
//! destination already has (same index key) stay behind and end up in a
//! numbered sibling folder, everything else is moved in. Nothing already in
//! the destination is ever overwritten.

use crate::error::{LibraryError, Result};
use crate::fsutil::{
    blocking, copy_file, list_by_extension, rename_folder, AUDIO_EXTS, IMAGE_EXTS,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

/// Merge folder `src` into `dst`, returning where the source ended up.
///
/// - If `dst` does not exist, `src` is renamed to it.
/// - Otherwise each audio file of `src` whose `index_of` key is not yet
///   present in `dst` is copied into `dst` (flattened to its file name) and
///   removed from `src`. If anything was copied, the images of `src` are
///   copied too, best effort.
/// - Audio left in `src` (duplicates) is moved to the first free
///   `dst (N)` sibling, which is returned. Otherwise `src` is deleted and
///   `dst` returned.
pub fn merge_folder<F>(src: &Path, dst: &Path, index_of: F) -> Result<PathBuf>
where
    F: Fn(&Path) -> u32,
{
    if std::fs::symlink_metadata(dst).is_err() {
        debug!("Destination {:?} is free, renaming", dst);
        return rename_folder(src, dst);
    }

    let mut keys: HashSet<u32> = list_by_extension(dst, AUDIO_EXTS)?
        .iter()
        .map(|f| index_of(f))
        .collect();

    let mut copied = 0usize;
    for file in list_by_extension(src, AUDIO_EXTS)? {
        let key = index_of(&file);
        if keys.contains(&key) {
            debug!("{:?} duplicates index {} in {:?}", file, key, dst);
            continue;
        }

        let Some(name) = file.file_name() else {
            continue;
        };
        let target = dst.join(name);
        if std::fs::symlink_metadata(&target).is_ok() {
            debug!("{:?} already exists, keeping {:?} aside", target, file);
            continue;
        }

        let src_path = src.join(&file);
        copy_file(&src_path, &target)?;
        keys.insert(key);
        copied += 1;
        std::fs::remove_file(&src_path).map_err(|e| LibraryError::io(&src_path, e))?;
    }

    if copied > 0 {
        info!("Merged {} tracks into {:?}", copied, dst);
        for image in list_by_extension(src, IMAGE_EXTS).unwrap_or_default() {
            let Some(name) = image.file_name() else {
                continue;
            };
            let target = dst.join(name);
            if std::fs::symlink_metadata(&target).is_ok() {
                debug!("{:?} already exists, not copying {:?}", target, image);
                continue;
            }
            if let Err(e) = copy_file(&src.join(&image), &target) {
                warn!("Failed to copy image {:?} into {:?}: {}", image, dst, e);
            }
        }
    }

    if !list_by_extension(src, AUDIO_EXTS)?.is_empty() {
        let sibling = rename_folder(src, dst)?;
        info!("Duplicate tracks kept in {:?}", sibling);
        return Ok(sibling);
    }

    std::fs::remove_dir_all(src).map_err(|e| LibraryError::io(src, e))?;
    Ok(dst.to_path_buf())
}

/// Serializes placements by destination folder.
///
/// Two bundles resolving to the same album folder must not merge at the same
/// time; holding the guard returned by [`PlacementLocks::lock`] across the
/// merge ensures that. An entry is dropped from the map once its last guard
/// is released.
#[derive(Default)]
pub struct PlacementLocks {
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl PlacementLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, dst: &Path) -> PlacementGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(dst.to_path_buf()).or_default().clone()
        };
        PlacementGuard {
            locks: self,
            dst: dst.to_path_buf(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of destinations currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, dst: &Path) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(dst)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(dst);
        }
    }
}

/// Held while merging into one destination.
pub struct PlacementGuard<'a> {
    locks: &'a PlacementLocks,
    dst: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PlacementGuard<'_> {
    fn drop(&mut self) {
        // The owned guard holds a clone of the Arc until it is dropped
        self.guard.take();
        self.locks.release(&self.dst);
    }
}

/// Runs [`merge_folder`] on the blocking pool while holding the lock for
/// `dst`.
pub async fn place<F>(
    locks: &PlacementLocks,
    src: PathBuf,
    dst: PathBuf,
    index_of: F,
) -> Result<PathBuf>
where
    F: Fn(&Path) -> u32 + Send + 'static,
{
    let _guard = locks.lock(&dst).await;
    blocking(move || merge_folder(&src, &dst, index_of)).await
}
