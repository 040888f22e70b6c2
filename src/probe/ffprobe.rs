//! `ffprobe` backed [`Prober`].

use super::{ImageStream, Prober, TrackProbe, TrackTags};
use crate::error::{LibraryError, Result};
use crate::process::{run_tool, ToolError};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Runs the external inspection program and parses its JSON report.
pub struct FfprobeProber {
    bin: PathBuf,
    cancel: CancellationToken,
}

impl FfprobeProber {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Child processes are killed when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn probe_args(path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(path.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    async fn probe(&self, path: &Path) -> Result<TrackProbe> {
        debug!("Probing {:?}", path);
        let output = run_tool(&self.bin, &Self::probe_args(path), &self.cancel, None)
            .await
            .map_err(|e| match e {
                ToolError::Canceled => LibraryError::Canceled,
                other => LibraryError::Probe {
                    path: path.to_path_buf(),
                    message: other.to_string(),
                },
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(path, &stdout)
    }

    async fn check_available(&self) -> Result<()> {
        let args = [OsString::from("-version")];
        run_tool(&self.bin, &args, &self.cancel, None)
            .await
            .map(|_| ())
            .map_err(|e| LibraryError::Probe {
                path: self.bin.clone(),
                message: format!("ffprobe not found or not working: {}", e),
            })
    }
}

/// ffprobe JSON output structure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FfprobeOutput {
    streams: Vec<FfprobeStream>,
    format: FfprobeFormat,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FfprobeStream {
    #[serde(deserialize_with = "lenient_u32")]
    index: u32,
    #[serde(deserialize_with = "lenient_string")]
    codec_name: String,
    #[serde(deserialize_with = "lenient_string")]
    codec_type: String,
    #[serde(deserialize_with = "lenient_u32")]
    channels: u32,
    #[serde(deserialize_with = "lenient_string")]
    sample_rate: String,
    #[serde(deserialize_with = "lenient_string")]
    bit_rate: String,
    #[serde(deserialize_with = "lenient_string")]
    bits_per_raw_sample: String,
    #[serde(deserialize_with = "lenient_string")]
    duration: String,
    #[serde(deserialize_with = "lenient_u32")]
    width: u32,
    #[serde(deserialize_with = "lenient_u32")]
    height: u32,
    #[serde(deserialize_with = "lenient_string")]
    pix_fmt: String,
    tags: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FfprobeFormat {
    #[serde(deserialize_with = "lenient_u32")]
    nb_streams: u32,
    #[serde(deserialize_with = "lenient_string")]
    format_name: String,
    #[serde(deserialize_with = "lenient_string")]
    duration: String,
    #[serde(deserialize_with = "lenient_string")]
    size: String,
    #[serde(deserialize_with = "lenient_string")]
    bit_rate: String,
    tags: HashMap<String, serde_json::Value>,
}

/// Accepts strings, numbers and null; anything missing becomes "".
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Accepts numbers and numeric strings; anything else becomes 0.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_u64().map(|v| v as u32).unwrap_or(0),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Option<T> {
    let value = value.trim();
    if value.is_empty() || value == "N/A" {
        return None;
    }
    value.parse().ok()
}

/// Lowercases tag keys so `ARTIST` (Vorbis comments) and `artist` (ID3)
/// resolve to the same entry.
fn normalize_tags(tags: &HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    tags.iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.to_lowercase(), value)
        })
        .collect()
}

fn build_tags(format: &HashMap<String, String>, stream: &HashMap<String, String>) -> TrackTags {
    let get = |keys: &[&str]| -> String {
        keys.iter()
            .find_map(|k| format.get(*k).or_else(|| stream.get(*k)))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    TrackTags {
        artist: get(&["artist", "album_artist"]),
        album: get(&["album"]),
        disc: get(&["disc", "discnumber"]),
        disc_total: get(&["disctotal", "totaldiscs"]),
        track: get(&["track", "tracknumber"]),
        track_total: get(&["tracktotal", "totaltracks"]),
        title: get(&["title"]),
        date: get(&["date", "year"]),
        genre: get(&["genre"]),
        comment: get(&["comment"]),
        encoder: get(&["encoder"]),
    }
}

/// Parses the JSON printed by ffprobe into a [`TrackProbe`] for `path`.
pub fn parse_probe_output(path: &Path, json: &str) -> Result<TrackProbe> {
    let output: FfprobeOutput = serde_json::from_str(json).map_err(|e| LibraryError::Probe {
        path: path.to_path_buf(),
        message: format!("JSON parse error: {}", e),
    })?;

    let audio = output.streams.iter().find(|s| s.codec_type == "audio");

    let format_tags = normalize_tags(&output.format.tags);
    let stream_tags = audio.map(|s| normalize_tags(&s.tags)).unwrap_or_default();

    // Prefer the container duration, fall back to the audio stream's
    let duration = parse_number::<f64>(&output.format.duration)
        .or_else(|| audio.and_then(|s| parse_number(&s.duration)))
        .unwrap_or(0.0);

    let bit_rate = audio
        .and_then(|s| parse_number(&s.bit_rate))
        .or_else(|| parse_number(&output.format.bit_rate));

    let embedded_image = output
        .streams
        .get(1)
        .filter(|s| s.width > 0 && s.height > 0)
        .map(|s| ImageStream {
            index: s.index,
            codec_name: s.codec_name.clone(),
            width: s.width,
            height: s.height,
            pix_fmt: s.pix_fmt.clone(),
        });

    Ok(TrackProbe {
        path: path.to_path_buf(),
        format_name: output.format.format_name.clone(),
        codec_name: audio.map(|s| s.codec_name.clone()).unwrap_or_default(),
        channels: audio.map(|s| s.channels).unwrap_or(0),
        sample_rate: audio.and_then(|s| parse_number(&s.sample_rate)),
        bit_rate,
        bits_per_raw_sample: audio.and_then(|s| parse_number(&s.bits_per_raw_sample)),
        duration,
        size: parse_number(&output.format.size),
        stream_count: output.format.nb_streams.max(output.streams.len() as u32),
        embedded_image,
        tags: build_tags(&format_tags, &stream_tags),
    })
}
