//! In-memory stand-ins for the external tools

use async_trait::async_trait;
use audiocc::probe::parse_probe_output;
use audiocc::{LibraryError, Prober, Result, TrackProbe, TranscodeJob, Transcoder};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Reads the file itself as ffprobe output.
pub struct FakeProber;

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, path: &Path) -> Result<TrackProbe> {
        let json = fs::read_to_string(path).map_err(|e| LibraryError::io(path, e))?;
        parse_probe_output(path, &json)
    }

    async fn check_available(&self) -> Result<()> {
        Ok(())
    }
}

/// Records every request and writes plausible outputs.
///
/// - `optimize_cover_art` copies the chosen image, so tests can tell which
///   candidate won by the cover's content.
/// - `extract_cover_art` writes `embedded_size` bytes.
/// - `to_mp3` writes the source file name into the output. The request
///   numbered `fail_on_job` (counting from 1) leaves a partial output and
///   fails instead.
pub struct FakeTranscoder {
    pub embedded_size: usize,
    pub jobs: Mutex<Vec<TranscodeJob>>,
    pub optimized: Mutex<Vec<(PathBuf, PathBuf)>>,
    pub extracted: Mutex<Vec<PathBuf>>,
    /// Fired when the first MP3 is requested; that and later requests fail
    /// as canceled.
    pub cancel_on_transcode: Option<CancellationToken>,
    pub fail_on_job: Option<usize>,
    requests: AtomicUsize,
}

impl FakeTranscoder {
    pub fn new() -> Self {
        Self {
            embedded_size: 16,
            jobs: Mutex::new(Vec::new()),
            optimized: Mutex::new(Vec::new()),
            extracted: Mutex::new(Vec::new()),
            cancel_on_transcode: None,
            fail_on_job: None,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_embedded_size(mut self, bytes: usize) -> Self {
        self.embedded_size = bytes;
        self
    }

    pub fn canceling(mut self, token: CancellationToken) -> Self {
        self.cancel_on_transcode = Some(token);
        self
    }

    pub fn failing_at(mut self, job: usize) -> Self {
        self.fail_on_job = Some(job);
        self
    }

    pub fn jobs(&self) -> Vec<TranscodeJob> {
        self.jobs.lock().unwrap().clone()
    }

    /// Sources passed to `optimize_cover_art`, in call order.
    pub fn cover_sources(&self) -> Vec<PathBuf> {
        self.optimized
            .lock()
            .unwrap()
            .iter()
            .map(|(src, _)| src.clone())
            .collect()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn optimize_cover_art(&self, src: &Path, dst: &Path) -> Result<()> {
        fs::copy(src, dst).map_err(|e| LibraryError::io(dst, e))?;
        self.optimized
            .lock()
            .unwrap()
            .push((src.to_path_buf(), dst.to_path_buf()));
        Ok(())
    }

    async fn extract_cover_art(&self, src: &Path, dst: &Path) -> Result<()> {
        fs::write(dst, vec![0xffu8; self.embedded_size]).map_err(|e| LibraryError::io(dst, e))?;
        self.extracted.lock().unwrap().push(src.to_path_buf());
        Ok(())
    }

    async fn to_mp3(&self, job: &TranscodeJob) -> Result<PathBuf> {
        if let Some(token) = &self.cancel_on_transcode {
            token.cancel();
            return Err(LibraryError::Canceled);
        }
        let request = self.requests.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_job == Some(request) {
            fs::write(&job.dst, b"partial").map_err(|e| LibraryError::io(&job.dst, e))?;
            return Err(LibraryError::Transcode {
                path: job.dst.clone(),
                stderr: "Error while decoding stream #0:0".to_string(),
            });
        }
        let name = job
            .src
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        fs::write(&job.dst, name).map_err(|e| LibraryError::io(&job.dst, e))?;
        self.jobs.lock().unwrap().push(job.clone());
        Ok(job.dst.clone())
    }

    async fn check_available(&self) -> Result<()> {
        Ok(())
    }
}
