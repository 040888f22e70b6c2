//! Error taxonomy shared by every stage of the organization pipeline.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = LibraryError> = std::result::Result<T, E>;

/// Errors that can occur while organizing a library.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ffprobe failed for {path:?}: {message}")]
    Probe { path: PathBuf, message: String },

    /// The transcoder exited non-zero. `stderr` is kept verbatim.
    #[error("ffmpeg failed for {path:?}: {stderr}")]
    Transcode { path: PathBuf, stderr: String },

    #[error("File not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to walk {root:?}: {message}")]
    Walk { root: PathBuf, message: String },

    #[error("Operation canceled")]
    Canceled,
}

impl LibraryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LibraryError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short, stable name of the error kind, used in run summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            LibraryError::Io { .. } => "io",
            LibraryError::Probe { .. } => "probe",
            LibraryError::Transcode { .. } => "transcode",
            LibraryError::NotFound(_) => "not_found",
            LibraryError::Walk { .. } => "walk",
            LibraryError::Canceled => "canceled",
        }
    }

    /// The offending path, when the error is tied to one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            LibraryError::Io { path, .. }
            | LibraryError::Probe { path, .. }
            | LibraryError::Transcode { path, .. }
            | LibraryError::NotFound(path) => Some(path),
            LibraryError::Walk { root, .. } => Some(root),
            LibraryError::Canceled => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, LibraryError::Canceled)
    }
}
