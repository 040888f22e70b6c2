//! Technical metadata and tags of audio files, as reported by an external
//! inspection program.

mod ffprobe;

pub use ffprobe::{parse_probe_output, FfprobeProber};

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Tag bag of a track. Missing tags are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub artist: String,
    pub album: String,
    pub disc: String,
    pub disc_total: String,
    pub track: String,
    pub track_total: String,
    pub title: String,
    pub date: String,
    pub genre: String,
    pub comment: String,
    pub encoder: String,
}

impl TrackTags {
    /// Leading number of the track tag ("3/12" -> 3).
    pub fn track_number(&self) -> Option<u32> {
        leading_number(&self.track)
    }

    /// Leading number of the disc tag ("1/2" -> 1).
    pub fn disc_number(&self) -> Option<u32> {
        leading_number(&self.disc)
    }

    /// Four-digit year at the start of the date tag.
    pub fn year(&self) -> Option<&str> {
        let year = self.date.get(..4)?;
        year.chars().all(|c| c.is_ascii_digit()).then_some(year)
    }
}

fn leading_number(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Pixel dimensions of an embedded picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// The picture stream of a file, when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStream {
    pub index: u32,
    pub codec_name: String,
    pub width: u32,
    pub height: u32,
    pub pix_fmt: String,
}

impl ImageStream {
    /// File extension matching the stream's codec, for stream-copy extraction.
    pub fn extension(&self) -> &'static str {
        match self.codec_name.as_str() {
            "png" => "png",
            _ => "jpg",
        }
    }
}

/// Probe result for a single audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackProbe {
    pub path: PathBuf,
    /// Container, e.g. "flac" or "mov,mp4,m4a,3gp,3g2,mj2".
    pub format_name: String,
    /// Codec of the audio stream.
    pub codec_name: String,
    pub channels: u32,
    pub sample_rate: Option<u32>,
    pub bit_rate: Option<u64>,
    pub bits_per_raw_sample: Option<u32>,
    /// Duration in seconds, 0 when unknown.
    pub duration: f64,
    pub size: Option<u64>,
    pub stream_count: u32,
    pub embedded_image: Option<ImageStream>,
    pub tags: TrackTags,
}

impl TrackProbe {
    /// A probe with no technical data, only tags. Handy for fakes.
    pub fn with_tags(path: impl Into<PathBuf>, tags: TrackTags) -> Self {
        Self {
            path: path.into(),
            format_name: String::new(),
            codec_name: String::new(),
            channels: 0,
            sample_rate: None,
            bit_rate: None,
            bits_per_raw_sample: None,
            duration: 0.0,
            size: None,
            stream_count: 1,
            embedded_image: None,
            tags,
        }
    }

    /// Dimensions of the embedded cover, if the second stream is a picture
    /// with non-zero width and height. Only metadata is inspected.
    pub fn embedded_image(&self) -> Option<ImageDimensions> {
        self.embedded_image
            .as_ref()
            .filter(|s| s.width > 0 && s.height > 0)
            .map(|s| ImageDimensions {
                width: s.width,
                height: s.height,
            })
    }

    /// Whether the container reports no usable duration. Such files go
    /// through the fix pass when transcoded.
    pub fn has_unknown_duration(&self) -> bool {
        !(self.duration > 0.0)
    }
}

/// Capability to inspect audio files.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Inspect `path` and return its streams, format and tags.
    async fn probe(&self, path: &Path) -> Result<TrackProbe>;

    /// Check that the underlying tool can be run at all.
    async fn check_available(&self) -> Result<()>;
}
