//! Filesystem helpers: discovery, bundling, copying and folder renames.

mod bundle;
mod files;
mod walk;

pub use bundle::{bundle_files, bundle_ranges};
pub use files::{copy_file, is_larger, nth_file_size, rename_folder};
pub use walk::{
    has_extension, list_audio, list_by_extension, list_image, AUDIO_EXTS, IMAGE_EXTS,
};

use crate::error::{LibraryError, Result};

/// Runs a filesystem closure on the blocking pool.
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LibraryError::io("<blocking task>", std::io::Error::other(e)))?
}
