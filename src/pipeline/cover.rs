//! Cover art selection for a bundle: sidecar images and embedded pictures
//! compete on file size, and the winner is scaled down into scratch.

use crate::error::{LibraryError, Result};
use crate::fsutil::{blocking, list_image, nth_file_size};
use crate::probe::TrackProbe;
use crate::transcode::Transcoder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the optimized cover inside a bundle's scratch directory.
pub const COVER_FILE_NAME: &str = "cover.jpg";

/// Picks the cover for a bundle and writes an optimized copy into `scratch`.
///
/// Candidates are the images found under `bundle_dir`, then the pictures
/// embedded in the probed tracks (extracted into `scratch`). The largest file
/// wins; on equal sizes the earlier candidate is kept.
pub async fn select_cover(
    transcoder: &dyn Transcoder,
    bundle_dir: &Path,
    probes: &[TrackProbe],
    scratch: &Path,
) -> Result<Option<PathBuf>> {
    let dir = bundle_dir.to_path_buf();
    let mut candidates: Vec<PathBuf> = blocking(move || {
        Ok(list_image(&dir)
            .into_iter()
            .map(|image| dir.join(image))
            .collect())
    })
    .await?;

    for (i, probe) in probes.iter().enumerate() {
        if probe.embedded_image().is_none() {
            continue;
        }
        let ext = probe
            .embedded_image
            .as_ref()
            .map_or("jpg", |stream| stream.extension());
        let dst = scratch.join(format!("embedded-{}.{}", i, ext));
        transcoder.extract_cover_art(&probe.path, &dst).await?;
        candidates.push(dst);
    }

    if candidates.is_empty() {
        debug!("No cover art for {:?}", bundle_dir);
        return Ok(None);
    }

    let best = match blocking(move || nth_file_size(&candidates, false)).await {
        Ok(best) => best,
        Err(LibraryError::NotFound(_)) => {
            warn!("No readable cover candidate for {:?}", bundle_dir);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let cover = scratch.join(COVER_FILE_NAME);
    debug!("Using {:?} as cover for {:?}", best, bundle_dir);
    transcoder.optimize_cover_art(&best, &cover).await?;
    Ok(Some(cover))
}
