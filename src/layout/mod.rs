//! Where organized albums go and how their tracks are named.

use crate::probe::TrackTags;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref DISC_TRACK: Regex = Regex::new(r"^(\d+)(?:-(\d+))?").unwrap();
}

/// Destination policy for organized bundles.
pub trait LibraryLayout: Send + Sync {
    /// Destination directory for an album, decided from one of its tracks.
    fn album_dir(&self, tags: &TrackTags) -> PathBuf;

    /// File name for a track; `position` is its 0-based index in the bundle.
    fn track_file_name(&self, tags: &TrackTags, position: usize) -> String;

    /// Deduplication key of a file already named by this layout.
    fn index_key(&self, file: &Path) -> u32 {
        disc_track_index(file)
    }
}

/// `disc * 1000 + track`, read from a file stem starting with
/// `<disc>-<track>`. A bare `<track>` prefix is taken as disc 1, and a stem
/// without leading digits gives 0.
pub fn disc_track_index(file: &Path) -> u32 {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let Some(caps) = DISC_TRACK.captures(&stem) else {
        return 0;
    };
    let first: u32 = caps[1].parse().unwrap_or(0);
    match caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()) {
        Some(track) => first.saturating_mul(1000).saturating_add(track),
        None => first.saturating_add(1000),
    }
}

/// Makes `name` safe to use as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            _ => c,
        })
        .collect();
    sanitized.trim().trim_start_matches('.').trim().to_string()
}

fn or_fallback(value: &str, fallback: &str) -> String {
    let sanitized = sanitize_component(value);
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized
    }
}

/// `<root>/<artist>/<year> - <album>/<disc>-<track> <title>.mp3`
#[derive(Debug, Clone)]
pub struct ArtistAlbumLayout {
    root: PathBuf,
}

impl ArtistAlbumLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LibraryLayout for ArtistAlbumLayout {
    fn album_dir(&self, tags: &TrackTags) -> PathBuf {
        let artist = or_fallback(&tags.artist, "Unknown Artist");
        let album = or_fallback(&tags.album, "Unknown Album");
        let album_dir = match tags.year() {
            Some(year) => format!("{} - {}", year, album),
            None => album,
        };
        self.root.join(artist).join(album_dir)
    }

    fn track_file_name(&self, tags: &TrackTags, position: usize) -> String {
        let disc = tags.disc_number().unwrap_or(1);
        let track = tags.track_number().unwrap_or(position as u32 + 1);
        let title = or_fallback(&tags.title, &format!("Track {}", track));
        format!("{}-{:02} {}.mp3", disc, track, title)
    }
}
