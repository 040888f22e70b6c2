//! MP3 production and cover art processing through an external encoder.

pub mod args;
mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

use crate::error::Result;
use crate::probe::TrackTags;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// Width, in pixels, of optimized cover art. Height keeps the aspect ratio.
pub const COVER_WIDTH: u32 = 500;

/// Requested MP3 quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Mp3Quality {
    /// Stream-copy the audio, no re-encoding.
    #[value(name = "copy")]
    Copy,
    /// libmp3lame, 320 kbps constant bit rate.
    #[value(name = "320")]
    Cbr320,
    /// libmp3lame, highest quality VBR (qscale 0).
    #[default]
    #[value(name = "v0")]
    V0,
}

impl Mp3Quality {
    /// Parses a quality tag: "copy", "320", anything else is V0.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "copy" => Mp3Quality::Copy,
            "320" => Mp3Quality::Cbr320,
            _ => Mp3Quality::V0,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Mp3Quality::Copy => "copy",
            Mp3Quality::Cbr320 => "320",
            Mp3Quality::V0 => "v0",
        }
    }
}

impl fmt::Display for Mp3Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Everything needed to produce one tagged MP3.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscodeJob {
    pub src: PathBuf,
    pub quality: Mp3Quality,
    pub tags: TrackTags,
    /// Image to embed as the front cover.
    pub cover: Option<PathBuf>,
    /// Re-encode without metadata first, then tag the result with a
    /// stream copy. Works around files with broken duration metadata.
    pub fix: bool,
    /// Output path, always with an `.mp3` extension.
    pub dst: PathBuf,
}

impl TranscodeJob {
    pub fn new(src: impl Into<PathBuf>, dst: impl AsRef<Path>, quality: Mp3Quality) -> Self {
        Self {
            src: src.into(),
            quality,
            tags: TrackTags::default(),
            cover: None,
            fix: false,
            dst: dst.as_ref().with_extension("mp3"),
        }
    }

    pub fn with_tags(mut self, tags: TrackTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_cover(mut self, cover: Option<PathBuf>) -> Self {
        self.cover = cover;
        self
    }

    /// Enables the fix pass. A copy quality can't repair anything, so it is
    /// upgraded to V0 for the first pass.
    pub fn with_fix(mut self, fix: bool) -> Self {
        self.fix = fix;
        if fix && self.quality == Mp3Quality::Copy {
            self.quality = Mp3Quality::V0;
        }
        self
    }

    /// Intermediate output of the fix pass: `<dst_stem>-fix.mp3`.
    pub fn fix_path(&self) -> PathBuf {
        let stem = self
            .dst
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.dst.with_file_name(format!("{}-fix.mp3", stem))
    }
}

/// Capability to encode audio and process cover images.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Rescale `src` to [`COVER_WIDTH`] pixels wide and write it to `dst`.
    /// The output format follows `dst`'s extension.
    async fn optimize_cover_art(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Write the embedded picture of audio file `src` to `dst` unchanged.
    async fn extract_cover_art(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Produce the MP3 described by `job`, returning its path.
    async fn to_mp3(&self, job: &TranscodeJob) -> Result<PathBuf>;

    /// Check that the underlying tool can be run at all.
    async fn check_available(&self) -> Result<()>;
}
