//! Argument vectors passed to the encoder. These are the wire contract with
//! ffmpeg and are kept free of any process handling.

use super::{Mp3Quality, COVER_WIDTH};
use crate::probe::TrackTags;
use std::ffi::OsString;
use std::path::Path;

struct ArgList(Vec<OsString>);

impl ArgList {
    fn new() -> Self {
        Self(Vec::new())
    }

    fn push(&mut self, arg: impl Into<OsString>) -> &mut Self {
        self.0.push(arg.into());
        self
    }

    fn path(&mut self, path: &Path) -> &mut Self {
        self.push(path.as_os_str())
    }

    fn metadata(&mut self, key: &str, value: &str) -> &mut Self {
        self.push("-metadata").push(format!("{}={}", key, value))
    }

    fn audio_codec(&mut self, quality: Mp3Quality) -> &mut Self {
        self.push("-c:a");
        match quality {
            Mp3Quality::Copy => self.push("copy"),
            Mp3Quality::Cbr320 => self.push("libmp3lame").push("-b:a").push("320k"),
            Mp3Quality::V0 => self.push("libmp3lame").push("-qscale:a").push("0"),
        }
    }

    fn build(&mut self) -> Vec<OsString> {
        std::mem::take(&mut self.0)
    }
}

/// `-i <src> -y -qscale:v 2 -vf scale=500:-1 <dst>`
pub fn optimize_cover_args(src: &Path, dst: &Path) -> Vec<OsString> {
    ArgList::new()
        .push("-i")
        .path(src)
        .push("-y")
        .push("-qscale:v")
        .push("2")
        .push("-vf")
        .push(format!("scale={}:-1", COVER_WIDTH))
        .path(dst)
        .build()
}

/// `-i <src> -an -c:v copy -y <dst>`
pub fn extract_cover_args(src: &Path, dst: &Path) -> Vec<OsString> {
    ArgList::new()
        .push("-i")
        .path(src)
        .push("-an")
        .push("-c:v")
        .push("copy")
        .push("-y")
        .path(dst)
        .build()
}

/// First invocation of the fix pass: re-encode the audio only and drop all
/// metadata.
pub fn fix_pass_args(src: &Path, quality: Mp3Quality, dst: &Path) -> Vec<OsString> {
    ArgList::new()
        .push("-i")
        .path(src)
        .push("-map")
        .push("0:a")
        .audio_codec(quality)
        .push("-map_metadata")
        .push("-1")
        .push("-y")
        .path(dst)
        .build()
}

/// Standard MP3 invocation: audio from the first input, ID3v2.4 tags, and
/// the optional cover from a second input as the front-cover picture.
pub fn mp3_args(
    src: &Path,
    cover: Option<&Path>,
    quality: Mp3Quality,
    tags: &TrackTags,
    dst: &Path,
) -> Vec<OsString> {
    let mut args = ArgList::new();
    args.push("-i").path(src);
    if let Some(cover) = cover {
        args.push("-i").path(cover);
    }

    args.push("-map").push("0:a").audio_codec(quality);

    args.push("-id3v2_version")
        .push("4")
        .metadata("artist", &tags.artist)
        .metadata("album", &tags.album)
        .metadata("disc", &tags.disc)
        .metadata("track", &tags.track)
        .metadata("title", &tags.title)
        .metadata("date", &tags.date);

    if cover.is_some() {
        args.push("-map")
            .push("1:v")
            .push("-c:v")
            .push("copy")
            .push("-metadata:s:v")
            .push("title=Album cover")
            .push("-metadata:s:v")
            .push("comment=Cover (Front)");
    }

    args.push("-y").path(dst).build()
}
