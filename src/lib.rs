//! Organizes a tree of loose audio files into a tagged MP3 library.
//!
//! Files are bundled by directory, inspected with `ffprobe`, transcoded with
//! `ffmpeg` and merged into album folders without ever overwriting what the
//! library already holds.

pub mod config;
pub mod error;
pub mod fsutil;
pub mod layout;
pub mod pipeline;
pub mod placement;
pub mod probe;
pub mod process;
pub mod transcode;

pub use error::{LibraryError, Result};
pub use layout::{ArtistAlbumLayout, LibraryLayout};
pub use pipeline::{Pipeline, PipelineConfig, RunSummary};
pub use probe::{FfprobeProber, Prober, TrackProbe, TrackTags};
pub use transcode::{FfmpegTranscoder, Mp3Quality, TranscodeJob, Transcoder};
