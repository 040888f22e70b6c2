//! `ffmpeg` backed [`Transcoder`].

use super::args::{extract_cover_args, fix_pass_args, mp3_args, optimize_cover_args};
use super::{Mp3Quality, TranscodeJob, Transcoder};
use crate::error::{LibraryError, Result};
use crate::process::{run_tool, ToolError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct FfmpegTranscoder {
    bin: PathBuf,
    cancel: CancellationToken,
}

impl FfmpegTranscoder {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Child processes are killed, and their partial output removed, when
    /// `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs ffmpeg writing to `output`, mapping failures to library errors.
    async fn exec(&self, args: &[OsString], output: &Path) -> Result<()> {
        run_tool(&self.bin, args, &self.cancel, Some(output))
            .await
            .map(|_| ())
            .map_err(|e| match e {
                ToolError::Canceled => LibraryError::Canceled,
                ToolError::Failed { stderr, .. } => LibraryError::Transcode {
                    path: output.to_path_buf(),
                    stderr,
                },
                ToolError::Spawn { source, .. } => LibraryError::io(&self.bin, source),
            })
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn optimize_cover_art(&self, src: &Path, dst: &Path) -> Result<()> {
        debug!("Optimizing cover art {:?} -> {:?}", src, dst);
        self.exec(&optimize_cover_args(src, dst), dst).await
    }

    async fn extract_cover_art(&self, src: &Path, dst: &Path) -> Result<()> {
        debug!("Extracting embedded cover art {:?} -> {:?}", src, dst);
        self.exec(&extract_cover_args(src, dst), dst).await
    }

    async fn to_mp3(&self, job: &TranscodeJob) -> Result<PathBuf> {
        let mut input = job.src.clone();
        let mut quality = job.quality;
        let mut intermediate = None;

        if job.fix {
            let fix_path = job.fix_path();
            debug!("Fix pass {:?} -> {:?}", job.src, fix_path);
            self.exec(&fix_pass_args(&job.src, job.quality, &fix_path), &fix_path)
                .await?;
            // The audio is encoded now; the tagging pass only copies it
            input = fix_path.clone();
            quality = Mp3Quality::Copy;
            intermediate = Some(fix_path);
        }

        debug!("Encoding {:?} -> {:?} ({})", input, job.dst, quality);
        let args = mp3_args(&input, job.cover.as_deref(), quality, &job.tags, &job.dst);
        self.exec(&args, &job.dst).await?;

        if let Some(fix_path) = intermediate {
            if let Err(e) = tokio::fs::remove_file(&fix_path).await {
                warn!("Failed to remove fix intermediate {:?}: {}", fix_path, e);
            }
        }

        Ok(job.dst.clone())
    }

    async fn check_available(&self) -> Result<()> {
        let args = [OsString::from("-version")];
        run_tool(&self.bin, &args, &self.cancel, None)
            .await
            .map(|_| ())
            .map_err(|e| LibraryError::Transcode {
                path: self.bin.clone(),
                stderr: format!("ffmpeg not found or not working: {}", e),
            })
    }
}
