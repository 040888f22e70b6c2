//! Drives a source tree through probing, cover selection, transcoding and
//! placement, one bundle (directory of audio files) at a time.

mod cover;

pub use cover::{select_cover, COVER_FILE_NAME};

use crate::error::{LibraryError, Result};
use crate::fsutil::{blocking, bundle_ranges, list_by_extension, AUDIO_EXTS};
use crate::layout::LibraryLayout;
use crate::placement::{place, PlacementLocks};
use crate::probe::{Prober, TrackProbe};
use crate::transcode::{Mp3Quality, TranscodeJob, Transcoder};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Prefix of the per-bundle scratch directories created in the library.
pub const SCRATCH_PREFIX: &str = ".audiocc-";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub quality: Mp3Quality,
    /// Always run the two-step fix pass, not only for files with unknown
    /// duration.
    pub fix: bool,
    pub embed_cover: bool,
    /// Bundles processed concurrently.
    pub jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality: Mp3Quality::default(),
            fix: false,
            embed_cover: true,
            jobs: 1,
        }
    }
}

/// Audio files sharing a parent directory, processed as one album.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    pub dir: PathBuf,
    /// Absolute paths, in discovery order.
    pub members: Vec<PathBuf>,
}

/// Outcome of a [`Pipeline::run`].
#[derive(Debug, Default)]
pub struct RunSummary {
    pub bundles: usize,
    pub placed: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, LibraryError)>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Pipeline {
    prober: Arc<dyn Prober>,
    transcoder: Arc<dyn Transcoder>,
    layout: Arc<dyn LibraryLayout>,
    locks: Arc<PlacementLocks>,
    library_root: PathBuf,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(
        prober: Arc<dyn Prober>,
        transcoder: Arc<dyn Transcoder>,
        layout: Arc<dyn LibraryLayout>,
        library_root: impl Into<PathBuf>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            prober,
            transcoder,
            layout,
            locks: Arc::new(PlacementLocks::new()),
            library_root: library_root.into(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Once `cancel` fires no new bundle is started. Pass the same token to
    /// the adapters so in-flight tools are stopped too.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Lists the audio files under `root` and groups them by directory.
    pub async fn discover(&self, root: &Path) -> Result<Vec<Bundle>> {
        let walk_root = root.to_path_buf();
        let files = blocking(move || list_by_extension(&walk_root, AUDIO_EXTS)).await?;

        Ok(bundle_ranges(root, &files)
            .into_iter()
            .map(|range| {
                let members: Vec<PathBuf> = files[range].iter().map(|f| root.join(f)).collect();
                let dir = members[0]
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                Bundle { dir, members }
            })
            .collect())
    }

    /// Organizes every bundle under `root` into the library.
    ///
    /// A failing bundle is logged and recorded in the summary; the others go
    /// on. Returns [`LibraryError::Canceled`] if the run was canceled.
    pub async fn run(&self, root: &Path) -> Result<RunSummary> {
        let bundles = self.discover(root).await?;
        info!(
            "Found {} bundles under {:?}, processing {} at a time",
            bundles.len(),
            root,
            self.config.jobs.max(1)
        );

        let mut summary = RunSummary {
            bundles: bundles.len(),
            ..Default::default()
        };

        let cancel = self.cancel.clone();
        let mut results = stream::iter(bundles)
            .take_while(move |_| futures::future::ready(!cancel.is_cancelled()))
            .map(|bundle| async move {
                let result = self.process_bundle(&bundle).await;
                (bundle.dir, result)
            })
            .buffer_unordered(self.config.jobs.max(1));

        while let Some((dir, result)) = results.next().await {
            match result {
                Ok(placed) => {
                    info!("Placed {:?} into {:?}", dir, placed);
                    summary.placed.push(placed);
                }
                Err(e) => {
                    if !e.is_canceled() {
                        error!(
                            "Bundle {:?} failed ({}) at {:?}: {}",
                            dir,
                            e.kind(),
                            e.path().unwrap_or(dir.as_path()),
                            e
                        );
                    }
                    summary.failures.push((dir, e));
                }
            }
        }

        if self.cancel.is_cancelled() {
            info!(
                "Run canceled after placing {} of {} bundles",
                summary.placed.len(),
                summary.bundles
            );
            return Err(LibraryError::Canceled);
        }

        Ok(summary)
    }

    /// Probes, transcodes and places one bundle. Nothing reaches the library
    /// unless every member was transcoded.
    pub async fn process_bundle(&self, bundle: &Bundle) -> Result<PathBuf> {
        if self.cancel.is_cancelled() {
            return Err(LibraryError::Canceled);
        }
        debug!(
            "Processing {:?} ({} files)",
            bundle.dir,
            bundle.members.len()
        );

        let library_root = self.library_root.clone();
        let scratch = blocking(move || {
            std::fs::create_dir_all(&library_root)
                .map_err(|e| LibraryError::io(&library_root, e))?;
            tempfile::Builder::new()
                .prefix(SCRATCH_PREFIX)
                .tempdir_in(&library_root)
                .map_err(|e| LibraryError::io(&library_root, e))
        })
        .await?;

        let mut probes = Vec::with_capacity(bundle.members.len());
        for member in &bundle.members {
            probes.push(self.prober.probe(member).await?);
        }
        let first = probes
            .first()
            .ok_or_else(|| LibraryError::NotFound(bundle.dir.clone()))?;

        let cover = if self.config.embed_cover {
            select_cover(self.transcoder.as_ref(), &bundle.dir, &probes, scratch.path()).await?
        } else {
            None
        };

        let out_dir = scratch.path().join("out");
        tokio::fs::create_dir(&out_dir)
            .await
            .map_err(|e| LibraryError::io(&out_dir, e))?;

        let mut used_names = HashSet::new();
        for (position, probe) in probes.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(LibraryError::Canceled);
            }
            let name = self.layout.track_file_name(&probe.tags, position);
            let name = unique_name(name, &mut used_names);
            let job = self.job_for(probe, out_dir.join(name), cover.clone());
            self.transcoder.to_mp3(&job).await?;
        }

        let dst = self.layout.album_dir(&first.tags);
        let layout = Arc::clone(&self.layout);
        let placed = place(&self.locks, out_dir, dst, move |file| {
            layout.index_key(file)
        })
        .await?;

        drop(scratch);
        Ok(placed)
    }

    fn job_for(&self, probe: &TrackProbe, dst: PathBuf, cover: Option<PathBuf>) -> TranscodeJob {
        let fix = self.config.fix || probe.has_unknown_duration();
        if fix && !self.config.fix {
            debug!("{:?} has no usable duration, enabling fix pass", probe.path);
        }
        TranscodeJob::new(&probe.path, dst, self.config.quality)
            .with_tags(probe.tags.clone())
            .with_cover(cover)
            .with_fix(fix)
    }
}

/// Appends ` (n)` to the stem of `name` until it is not in `used`.
fn unique_name(name: String, used: &mut HashSet<String>) -> String {
    if used.insert(name.clone()) {
        return name;
    }
    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut n = 2;
    loop {
        let candidate = format!("{} ({}).{}", stem, n, ext);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ArtistAlbumLayout;
    use crate::probe::{ImageStream, TrackTags};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Probe results keyed by file name; unknown files fail.
    struct MockProber {
        probes: HashMap<String, TrackProbe>,
    }

    #[async_trait]
    impl Prober for MockProber {
        async fn probe(&self, path: &Path) -> Result<TrackProbe> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            match self.probes.get(&name) {
                Some(probe) => {
                    let mut probe = probe.clone();
                    probe.path = path.to_path_buf();
                    Ok(probe)
                }
                None => Err(LibraryError::Probe {
                    path: path.to_path_buf(),
                    message: "unknown file".to_string(),
                }),
            }
        }

        async fn check_available(&self) -> Result<()> {
            Ok(())
        }
    }

    /// Writes a small file for every output and records the jobs.
    #[derive(Default)]
    struct MockTranscoder {
        jobs: Mutex<Vec<TranscodeJob>>,
        optimized: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Transcoder for MockTranscoder {
        async fn optimize_cover_art(&self, src: &Path, dst: &Path) -> Result<()> {
            self.optimized.lock().unwrap().push(src.to_path_buf());
            std::fs::write(dst, b"cover").unwrap();
            Ok(())
        }

        async fn extract_cover_art(&self, _src: &Path, dst: &Path) -> Result<()> {
            std::fs::write(dst, vec![0u8; 64]).unwrap();
            Ok(())
        }

        async fn to_mp3(&self, job: &TranscodeJob) -> Result<PathBuf> {
            std::fs::write(&job.dst, job.src.to_string_lossy().as_bytes()).unwrap();
            self.jobs.lock().unwrap().push(job.clone());
            Ok(job.dst.clone())
        }

        async fn check_available(&self) -> Result<()> {
            Ok(())
        }
    }

    fn probe(name: &str, track: &str, duration: f64) -> (String, TrackProbe) {
        let tags = TrackTags {
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            track: track.to_string(),
            title: format!("Title {}", track),
            ..Default::default()
        };
        let mut probe = TrackProbe::with_tags(name, tags);
        probe.duration = duration;
        (name.to_string(), probe)
    }

    fn pipeline(
        probes: Vec<(String, TrackProbe)>,
        transcoder: Arc<MockTranscoder>,
        library: &Path,
        config: PipelineConfig,
    ) -> Pipeline {
        Pipeline::new(
            Arc::new(MockProber {
                probes: probes.into_iter().collect(),
            }),
            transcoder,
            Arc::new(ArtistAlbumLayout::new(library)),
            library,
            config,
        )
    }

    #[tokio::test]
    async fn test_discover_groups_by_directory() {
        let source = TempDir::new().unwrap();
        for name in ["a/1.flac", "a/2.flac", "a/b/1.flac", "c/1.mp3", "c/notes.txt"] {
            let path = source.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }
        let library = TempDir::new().unwrap();
        let pipeline = pipeline(
            vec![],
            Arc::new(MockTranscoder::default()),
            library.path(),
            PipelineConfig::default(),
        );

        let bundles = pipeline.discover(source.path()).await.unwrap();

        let dirs: Vec<PathBuf> = bundles.iter().map(|b| b.dir.clone()).collect();
        assert_eq!(
            dirs,
            vec![
                source.path().join("a"),
                source.path().join("a/b"),
                source.path().join("c")
            ]
        );
        assert_eq!(
            bundles[0].members,
            vec![source.path().join("a/1.flac"), source.path().join("a/2.flac")]
        );
    }

    #[tokio::test]
    async fn test_discover_splits_directory_around_subfolder() {
        let source = TempDir::new().unwrap();
        for name in ["a/1.flac", "a/b/1.flac", "a/c.flac"] {
            let path = source.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }
        let library = TempDir::new().unwrap();
        let pipeline = pipeline(
            vec![],
            Arc::new(MockTranscoder::default()),
            library.path(),
            PipelineConfig::default(),
        );

        let bundles = pipeline.discover(source.path()).await.unwrap();

        let dirs: Vec<PathBuf> = bundles.iter().map(|b| b.dir.clone()).collect();
        assert_eq!(
            dirs,
            vec![
                source.path().join("a"),
                source.path().join("a/b"),
                source.path().join("a")
            ]
        );
        assert_eq!(bundles[2].members, vec![source.path().join("a/c.flac")]);
    }

    #[tokio::test]
    async fn test_bundle_is_transcoded_and_placed() {
        let source = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        let album = source.path().join("rip");
        std::fs::create_dir_all(&album).unwrap();
        std::fs::write(album.join("01.flac"), "").unwrap();
        std::fs::write(album.join("02.flac"), "").unwrap();
        std::fs::write(album.join("folder.jpg"), "jpg").unwrap();

        let transcoder = Arc::new(MockTranscoder::default());
        let pipeline = pipeline(
            vec![probe("01.flac", "1", 100.0), probe("02.flac", "2", 0.0)],
            Arc::clone(&transcoder),
            library.path(),
            PipelineConfig::default(),
        );

        let summary = pipeline.run(source.path()).await.unwrap();

        let dst = library.path().join("Artist/Album");
        assert!(summary.is_success());
        assert_eq!(summary.placed, vec![dst.clone()]);
        assert!(dst.join("1-01 Title 1.mp3").exists());
        assert!(dst.join("1-02 Title 2.mp3").exists());

        let jobs = transcoder.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(!jobs[0].fix);
        assert!(jobs[1].fix, "unknown duration enables the fix pass");
        assert!(jobs.iter().all(|j| j.cover.is_some()));
        assert_eq!(
            *transcoder.optimized.lock().unwrap(),
            vec![album.join("folder.jpg")]
        );

        // Scratch directories are gone
        let leftovers: Vec<_> = std::fs::read_dir(library.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_embedded_cover_beats_smaller_sidecar() {
        let source = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        std::fs::write(source.path().join("01.flac"), "").unwrap();
        std::fs::write(source.path().join("small.png"), "png").unwrap();

        let (name, mut with_image) = probe("01.flac", "1", 10.0);
        with_image.embedded_image = Some(ImageStream {
            index: 1,
            codec_name: "mjpeg".to_string(),
            width: 600,
            height: 600,
            pix_fmt: String::new(),
        });

        let transcoder = Arc::new(MockTranscoder::default());
        let pipeline = pipeline(
            vec![(name, with_image)],
            Arc::clone(&transcoder),
            library.path(),
            PipelineConfig::default(),
        );
        pipeline.run(source.path()).await.unwrap();

        let optimized = transcoder.optimized.lock().unwrap();
        assert_eq!(optimized.len(), 1);
        assert_eq!(optimized[0].file_name().unwrap(), "embedded-0.jpg");
    }

    #[tokio::test]
    async fn test_no_cover_when_disabled() {
        let source = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        std::fs::write(source.path().join("01.flac"), "").unwrap();
        std::fs::write(source.path().join("folder.jpg"), "jpg").unwrap();

        let transcoder = Arc::new(MockTranscoder::default());
        let pipeline = pipeline(
            vec![probe("01.flac", "1", 10.0)],
            Arc::clone(&transcoder),
            library.path(),
            PipelineConfig {
                embed_cover: false,
                quality: Mp3Quality::Cbr320,
                ..Default::default()
            },
        );
        pipeline.run(source.path()).await.unwrap();

        assert!(transcoder.optimized.lock().unwrap().is_empty());
        let jobs = transcoder.jobs.lock().unwrap();
        assert_eq!(jobs[0].cover, None);
        assert_eq!(jobs[0].quality, Mp3Quality::Cbr320);
    }

    #[tokio::test]
    async fn test_probe_failure_fails_only_its_bundle() {
        let source = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        for name in ["good/01.flac", "bad/broken.flac"] {
            let path = source.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "").unwrap();
        }

        let transcoder = Arc::new(MockTranscoder::default());
        let pipeline = pipeline(
            vec![probe("01.flac", "1", 10.0)],
            Arc::clone(&transcoder),
            library.path(),
            PipelineConfig {
                jobs: 2,
                ..Default::default()
            },
        );
        let summary = pipeline.run(source.path()).await.unwrap();

        assert_eq!(summary.bundles, 2);
        assert_eq!(summary.placed.len(), 1);
        assert_eq!(summary.failures.len(), 1);
        let (dir, err) = &summary.failures[0];
        assert_eq!(dir, &source.path().join("bad"));
        assert_eq!(err.kind(), "probe");
    }

    #[tokio::test]
    async fn test_canceled_run() {
        let source = TempDir::new().unwrap();
        let library = TempDir::new().unwrap();
        std::fs::write(source.path().join("01.flac"), "").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let transcoder = Arc::new(MockTranscoder::default());
        let pipeline = pipeline(
            vec![probe("01.flac", "1", 10.0)],
            Arc::clone(&transcoder),
            library.path(),
            PipelineConfig::default(),
        )
        .with_cancellation(cancel);

        let result = pipeline.run(source.path()).await;

        assert!(matches!(result, Err(LibraryError::Canceled)));
        assert!(transcoder.jobs.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unique_name() {
        let mut used = HashSet::new();
        assert_eq!(unique_name("1-01 A.mp3".to_string(), &mut used), "1-01 A.mp3");
        assert_eq!(unique_name("1-01 A.mp3".to_string(), &mut used), "1-01 A (2).mp3");
        assert_eq!(unique_name("1-01 A.mp3".to_string(), &mut used), "1-01 A (3).mp3");
    }
}
