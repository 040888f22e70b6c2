//! Source tree fixtures
//!
//! Audio files written here contain the JSON ffprobe would print for them,
//! which is what [`super::FakeProber`] reads back.

use super::{FakeProber, FakeTranscoder};
use audiocc::fsutil::list_audio;
use audiocc::{ArtistAlbumLayout, Pipeline, PipelineConfig};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const ARTIST_1: &str = "The Examples";
pub const ALBUM_1: &str = "First Light";
pub const ARTIST_2: &str = "Nobody";
pub const ALBUM_2: &str = "Tapes";

/// Tags and stream layout of one fake audio file.
#[derive(Debug, Clone)]
pub struct TrackFixture {
    pub artist: String,
    pub album: String,
    pub date: String,
    pub disc: String,
    pub track: String,
    pub title: String,
    /// Container duration; "N/A" marks a broken file.
    pub duration: String,
    /// Width and height of an embedded picture.
    pub cover: Option<(u32, u32)>,
}

impl TrackFixture {
    pub fn new(artist: &str, album: &str, track: u32) -> Self {
        Self {
            artist: artist.to_string(),
            album: album.to_string(),
            date: "2004".to_string(),
            disc: "1".to_string(),
            track: track.to_string(),
            title: format!("Song {}", track),
            duration: "180.000000".to_string(),
            cover: None,
        }
    }

    pub fn disc(mut self, disc: u32) -> Self {
        self.disc = disc.to_string();
        self
    }

    pub fn broken_duration(mut self) -> Self {
        self.duration = "N/A".to_string();
        self
    }

    pub fn with_cover(mut self, width: u32, height: u32) -> Self {
        self.cover = Some((width, height));
        self
    }

    /// The ffprobe JSON for this track. Tags use Vorbis-style upper case
    /// keys to exercise case-insensitive parsing.
    pub fn probe_json(&self) -> String {
        let mut streams = vec![json!({
            "index": 0,
            "codec_name": "flac",
            "codec_type": "audio",
            "sample_rate": "44100",
            "channels": 2,
            "bits_per_raw_sample": "16",
        })];
        if let Some((width, height)) = self.cover {
            streams.push(json!({
                "index": 1,
                "codec_name": "mjpeg",
                "codec_type": "video",
                "width": width,
                "height": height,
                "pix_fmt": "yuvj420p",
            }));
        }

        let nb_streams = streams.len();
        json!({
            "streams": streams,
            "format": {
                "nb_streams": nb_streams,
                "format_name": "flac",
                "duration": self.duration,
                "tags": {
                    "ARTIST": self.artist,
                    "ALBUM": self.album,
                    "DATE": self.date,
                    "DISC": self.disc,
                    "TRACK": self.track,
                    "TITLE": self.title,
                }
            }
        })
        .to_string()
    }
}

/// Writes `track` as the fake audio file `path` (relative to `root`).
pub fn write_track(root: &Path, path: &str, track: &TrackFixture) -> PathBuf {
    let full = root.join(path);
    fs::create_dir_all(full.parent().unwrap()).unwrap();
    fs::write(&full, track.probe_json()).unwrap();
    full
}

/// Creates `files` (name, contents) under `root`.
pub fn create_files<C: AsRef<[u8]>>(root: &Path, files: &[(&str, C)]) {
    for (name, contents) in files {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents.as_ref()).unwrap();
    }
}

/// File names of the audio under `dir`, in discovery order.
pub fn audio_names(dir: &Path) -> Vec<String> {
    list_audio(dir)
        .into_iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect()
}

/// A pipeline over the fakes, organizing into `library` with the default
/// layout.
pub fn make_pipeline(
    transcoder: Arc<FakeTranscoder>,
    library: &Path,
    config: PipelineConfig,
) -> Pipeline {
    Pipeline::new(
        Arc::new(FakeProber),
        transcoder,
        Arc::new(ArtistAlbumLayout::new(library)),
        library,
        config,
    )
}
