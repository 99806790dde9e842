//! Promotes raw full-disk frames to cropped, resized cache entries so training and
//! serving read the cheap path.

use crate::satellite::error::FrameError;
use crate::satellite::frame_index::{FrameSource, SatelliteFrameIndex};
use chrono::{DateTime, Utc};
use log::{info, warn};
use ndarray_npy::WriteNpyExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SatelliteFrameIndex {
    /// Writes a cached copy of every raw frame that has none yet.
    ///
    /// Individual frames that fail to decode are logged and counted; only failing
    /// to create the cache directory aborts the run.
    pub fn preprocess_raw_frames(&mut self) -> Result<PreprocessReport, FrameError> {
        let cache_dir = self.config.cache_dir.clone();
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| FrameError::CacheDirCreation(cache_dir.clone(), e))?;

        let mut report = PreprocessReport::default();
        let pending: Vec<(DateTime<Utc>, PathBuf)> = self
            .frames
            .iter()
            .filter_map(|(timestamp, source)| match source {
                FrameSource::Raw(path) => Some((*timestamp, path.clone())),
                FrameSource::Cached(_) => None,
            })
            .collect();
        report.skipped = self.frames.len() - pending.len();

        info!(
            "Preprocessing {} raw frames into '{}'",
            pending.len(),
            cache_dir.display()
        );

        for (timestamp, raw_path) in pending {
            match self.cache_raw_frame(&raw_path, &cache_dir) {
                Ok(cached_path) => {
                    self.frames
                        .insert(timestamp, FrameSource::Cached(cached_path));
                    report.processed += 1;
                }
                Err(e) => {
                    warn!("Failed to preprocess '{}': {}", raw_path.display(), e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Preprocessing complete: {} processed, {} skipped, {} failed",
            report.processed, report.skipped, report.failed
        );
        Ok(report)
    }

    fn cache_raw_frame(&self, raw_path: &Path, cache_dir: &Path) -> Result<PathBuf, FrameError> {
        let grid = self.load_raw(raw_path)?;

        let stem = raw_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let cached_path = cache_dir.join(format!("{}.npy", stem));

        let mut temp_file = NamedTempFile::new_in(cache_dir)
            .map_err(|e| FrameError::CacheWrite(cached_path.clone(), e))?;
        grid.write_npy(&mut temp_file)
            .map_err(|e| FrameError::Encode(cached_path.clone(), e))?;
        temp_file
            .flush()
            .map_err(|e| FrameError::CacheWrite(cached_path.clone(), e))?;
        temp_file
            .persist(&cached_path)
            .map_err(|e| FrameError::CacheWrite(cached_path.clone(), e.error))?;

        Ok(cached_path)
    }
}
