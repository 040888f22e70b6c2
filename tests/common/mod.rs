//! Common test infrastructure
//!
//! Fake adapters standing in for ffprobe and ffmpeg, and helpers to lay out
//! source trees. Tests should only import from this module.

#![allow(dead_code)]

mod fakes;
mod fixtures;

pub use fakes::{FakeProber, FakeTranscoder};
pub use fixtures::{
    audio_names, create_files, make_pipeline, write_track, TrackFixture, ALBUM_1, ALBUM_2,
    ARTIST_1, ARTIST_2,
};
