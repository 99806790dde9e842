//! Catalogue of satellite frames available on disk.
//!
//! Frames are discovered by scanning directories for files named
//! `<prefix>_<YYYYMMDD>_<HHMM>_<suffix>`, where the prefix itself may contain
//! underscores (`NC_H09` is the default). Two kinds of directory are scanned:
//!
//! * a *cache* directory of pre-cropped `output_size x output_size` `.npy` frames, and
//! * one or more *raw* directories of full-disk grids that must be cropped and
//!   resized on load. Each raw file is decoded by the [`RawFrameDecoder`] registered
//!   for its extension.
//!
//! When both exist for the same timestamp the cached frame wins.

use crate::geo::projection::{CropBox, GeoRegion, GridProjection};
use crate::satellite::error::FrameError;
use crate::satellite::resize::{crop, resize_bilinear};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info, warn};
use ndarray::{Array2, ArrayD, Axis, Ix2};
use ndarray_npy::{ReadNpyError, ReadNpyExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CACHE_EXTENSION: &str = "npy";

/// Brightness temperatures are mapped to roughly `[0, 1]` via `(K - 200) / 100`.
pub const KELVIN_OFFSET: f32 = 200.0;
pub const KELVIN_SCALE: f32 = 100.0;

/// Where and how satellite frames are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct FrameStoreConfig {
    /// Directory of pre-cropped frames.
    #[builder(default = PathBuf::from("processed_data"), into)]
    pub cache_dir: PathBuf,
    /// Directories of raw full-disk frames, scanned in order.
    #[builder(default = vec![PathBuf::from("satellite_data")])]
    pub raw_dirs: Vec<PathBuf>,
    /// Filename prefix preceding the date and time segments.
    #[builder(default = "NC_H09".to_string(), into)]
    pub prefix: String,
    /// Side length of the square model input.
    #[builder(default = 64)]
    pub output_size: usize,
    /// Grids larger than this in either axis are treated as full-disk and cropped.
    #[builder(default = 1000)]
    pub full_disk_threshold: usize,
}

impl Default for FrameStoreConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Backing file of an indexed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSource {
    Cached(PathBuf),
    Raw(PathBuf),
}

impl FrameSource {
    pub fn path(&self) -> &Path {
        match self {
            FrameSource::Cached(path) | FrameSource::Raw(path) => path,
        }
    }
}

/// A loaded frame, already cropped and resized to the model input size.
#[derive(Debug, Clone)]
pub struct SatelliteFrame {
    pub timestamp: DateTime<Utc>,
    /// Brightness temperature in Kelvin.
    pub kelvin: Array2<f32>,
}

impl SatelliteFrame {
    /// The frame in model units.
    pub fn normalized(&self) -> Array2<f32> {
        self.kelvin.mapv(|v| (v - KELVIN_OFFSET) / KELVIN_SCALE)
    }
}

/// Decodes one raw frame file into a 2D grid.
///
/// `.npy` grids are always understood. The provider's NetCDF files are read by
/// `NetcdfFrameDecoder` when the `netcdf` feature is enabled.
pub trait RawFrameDecoder: Send + Sync {
    /// File extension (without the dot) of files this decoder understands.
    fn extension(&self) -> &str;

    fn decode(&self, path: &Path) -> Result<Array2<f32>, FrameError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NpyFrameDecoder;

impl RawFrameDecoder for NpyFrameDecoder {
    fn extension(&self) -> &str {
        CACHE_EXTENSION
    }

    fn decode(&self, path: &Path) -> Result<Array2<f32>, FrameError> {
        read_npy_grid(path)
    }
}

/// Set of satellite frames available on disk, keyed by UTC capture time.
///
/// The index is built once by [`SatelliteFrameIndex::scan`] and is immutable
/// afterwards, apart from [`SatelliteFrameIndex::preprocess_raw_frames`] promoting
/// raw frames to cached ones.
pub struct SatelliteFrameIndex {
    pub(crate) config: FrameStoreConfig,
    pub(crate) crop_box: CropBox,
    pub(crate) frames: BTreeMap<DateTime<Utc>, FrameSource>,
    pub(crate) decoders: Vec<Arc<dyn RawFrameDecoder>>,
}

/// Raw decoders used by [`SatelliteFrameIndex::scan`].
pub fn default_decoders() -> Vec<Arc<dyn RawFrameDecoder>> {
    #[allow(unused_mut)]
    let mut decoders: Vec<Arc<dyn RawFrameDecoder>> = vec![Arc::new(NpyFrameDecoder)];
    #[cfg(feature = "netcdf")]
    decoders.push(Arc::new(crate::satellite::netcdf::NetcdfFrameDecoder));
    decoders
}

impl SatelliteFrameIndex {
    /// Scans the configured directories using [`default_decoders`].
    pub fn scan(config: FrameStoreConfig, projection: &GridProjection, region: &GeoRegion) -> Self {
        Self::scan_with_decoders(config, projection, region, default_decoders())
    }

    /// Scans the configured directories. Raw files are only indexed when one of
    /// `decoders` handles their extension. Missing or unreadable directories are
    /// logged and contribute no frames.
    pub fn scan_with_decoders(
        config: FrameStoreConfig,
        projection: &GridProjection,
        region: &GeoRegion,
        decoders: Vec<Arc<dyn RawFrameDecoder>>,
    ) -> Self {
        let mut frames = BTreeMap::new();
        let extensions: Vec<&str> = decoders.iter().map(|d| d.extension()).collect();

        for raw_dir in &config.raw_dirs {
            let found = scan_directory(raw_dir, &config.prefix, &extensions);
            info!(
                "Found {} raw satellite frames in '{}'",
                found.len(),
                raw_dir.display()
            );
            for (timestamp, path) in found {
                frames.insert(timestamp, FrameSource::Raw(path));
            }
        }

        let cached = scan_directory(&config.cache_dir, &config.prefix, &[CACHE_EXTENSION]);
        info!(
            "Found {} cached satellite frames in '{}'",
            cached.len(),
            config.cache_dir.display()
        );
        for (timestamp, path) in cached {
            frames.insert(timestamp, FrameSource::Cached(path));
        }

        info!("Satellite index holds {} distinct timestamps", frames.len());

        Self {
            crop_box: projection.crop_box(region),
            config,
            frames,
            decoders,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn crop_box(&self) -> CropBox {
        self.crop_box
    }

    pub fn config(&self) -> &FrameStoreConfig {
        &self.config
    }

    pub fn has_frame(&self, timestamp: DateTime<Utc>) -> bool {
        self.frames.contains_key(&timestamp)
    }

    pub fn source(&self, timestamp: DateTime<Utc>) -> Option<&FrameSource> {
        self.frames.get(&timestamp)
    }

    /// Indexed capture times, ascending.
    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.frames.keys().copied()
    }

    /// Loads the frame captured at `timestamp`.
    ///
    /// Returns `None` when no frame is indexed for that time. Frames that exist but
    /// cannot be read are logged and also reported as `None`.
    pub fn load(&self, timestamp: DateTime<Utc>) -> Option<SatelliteFrame> {
        let source = self.frames.get(&timestamp)?;
        let loaded = match source {
            FrameSource::Cached(path) => self.load_cached(path),
            FrameSource::Raw(path) => self.load_raw(path),
        };
        match loaded {
            Ok(kelvin) => Some(SatelliteFrame { timestamp, kelvin }),
            Err(e) => {
                warn!("Treating satellite frame at {} as missing: {}", timestamp, e);
                None
            }
        }
    }

    fn load_cached(&self, path: &Path) -> Result<Array2<f32>, FrameError> {
        let grid = read_npy_grid(path)?;
        let size = self.config.output_size;
        if grid.dim() == (size, size) {
            return Ok(grid);
        }
        debug!(
            "Cached frame '{}' is {:?}, resizing to {}x{}",
            path.display(),
            grid.dim(),
            size,
            size
        );
        Ok(resize_bilinear(grid.view(), size, size))
    }

    /// Decodes a raw frame and brings it to the model input size.
    pub(crate) fn load_raw(&self, path: &Path) -> Result<Array2<f32>, FrameError> {
        let extension = path.extension().and_then(|ext| ext.to_str());
        let decoder = self
            .decoders
            .iter()
            .find(|d| Some(d.extension()) == extension)
            .ok_or_else(|| FrameError::NoDecoder(path.to_path_buf()))?;
        let grid = decoder.decode(path)?;
        let (rows, cols) = grid.dim();
        if rows == 0 || cols == 0 {
            return Err(FrameError::Empty(path.to_path_buf()));
        }

        let size = self.config.output_size;
        let threshold = self.config.full_disk_threshold;
        if rows > threshold || cols > threshold {
            if !self.crop_box.fits_within(rows, cols) {
                return Err(FrameError::CropOutOfBounds {
                    path: path.to_path_buf(),
                    rows,
                    cols,
                });
            }
            let region = crop(grid.view(), &self.crop_box);
            return Ok(resize_bilinear(region.view(), size, size));
        }

        if grid.dim() == (size, size) {
            Ok(grid)
        } else {
            Ok(resize_bilinear(grid.view(), size, size))
        }
    }
}

/// Formats a capture time as the `YYYYMMDD_HHMM` key embedded in frame filenames.
pub fn frame_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d_%H%M").to_string()
}

/// Extracts the UTC capture time from a frame filename.
///
/// The filename is split on `_`; the date and time are the two segments that
/// immediately follow the prefix (segments 2 and 3 for the default `NC_H09`).
pub fn parse_frame_timestamp(file_name: &str, prefix: &str) -> Option<DateTime<Utc>> {
    if !file_name.starts_with(&format!("{}_", prefix)) {
        return None;
    }
    let date_segment = prefix.split('_').count();
    let parts: Vec<&str> = file_name.split('_').collect();
    let date = parts.get(date_segment)?;
    let time = parts.get(date_segment + 1)?;
    // The time may be the last segment, in which case it still carries the extension.
    let time = time.split('.').next().unwrap_or(time);

    if date.len() != 8 || time.len() != 4 {
        return None;
    }
    if !date.bytes().chain(time.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }

    NaiveDateTime::parse_from_str(&format!("{}{}", date, time), "%Y%m%d%H%M")
        .ok()
        .map(|naive| naive.and_utc())
}

fn scan_directory(dir: &Path, prefix: &str, extensions: &[&str]) -> Vec<(DateTime<Utc>, PathBuf)> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Satellite directory '{}' not found, skipping", dir.display());
            return Vec::new();
        }
        Err(e) => {
            warn!("{}", FrameError::DirectoryScan(dir.to_path_buf(), e));
            return Vec::new();
        }
    };

    let mut found = Vec::new();
    let mut undecodable = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        let Some(timestamp) = parse_frame_timestamp(name, prefix) else {
            debug!("Ignoring '{}': not a frame filename", path.display());
            continue;
        };
        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
        if extensions.contains(&extension) {
            found.push((timestamp, path));
        } else {
            undecodable += 1;
        }
    }
    if undecodable > 0 {
        warn!(
            "Skipped {} frame files in '{}' with no decoder for their format (expected {:?})",
            undecodable,
            dir.display(),
            extensions
        );
    }
    // Deterministic winner when two files share a timestamp.
    found.sort();
    found
}

/// Reads a `.npy` grid stored as `float32` or `float64`, dropping leading unit axes.
pub(crate) fn read_npy_grid(path: &Path) -> Result<Array2<f32>, FrameError> {
    let open = || File::open(path).map_err(|e| FrameError::Open(path.to_path_buf(), e));

    let grid: ArrayD<f32> = match ArrayD::<f32>::read_npy(open()?) {
        Ok(grid) => grid,
        Err(ReadNpyError::WrongDescriptor(_)) => ArrayD::<f64>::read_npy(open()?)
            .map_err(|e| FrameError::Decode(path.to_path_buf(), e))?
            .mapv(|v| v as f32),
        Err(e) => return Err(FrameError::Decode(path.to_path_buf(), e)),
    };

    let mut grid = grid;
    while grid.ndim() > 2 && grid.shape()[0] == 1 {
        grid = grid.index_axis_move(Axis(0), 0);
    }
    let shape = grid.shape().to_vec();
    grid.into_dimensionality::<Ix2>()
        .map_err(|_| FrameError::UnexpectedShape {
            path: path.to_path_buf(),
            shape,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ndarray_npy::WriteNpyExt;
    use tempfile::TempDir;

    fn write_grid(path: &Path, grid: &Array2<f32>) {
        let file = File::create(path).unwrap();
        grid.write_npy(file).unwrap();
    }

    fn config_for(cache: &Path, raw: &Path) -> FrameStoreConfig {
        FrameStoreConfig::builder()
            .cache_dir(cache)
            .raw_dirs(vec![raw.to_path_buf()])
            .output_size(8)
            .full_disk_threshold(20)
            .build()
    }

    #[test]
    fn test_parse_frame_timestamp() {
        let ts = parse_frame_timestamp("NC_H09_20260114_0810_R21_FLDK.06001_06001.npy", "NC_H09")
            .unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 1, 14, 8, 10, 0).unwrap());
        assert_eq!(frame_key(ts), "20260114_0810");

        let short = parse_frame_timestamp("NC_H09_20260114_0810.npy", "NC_H09").unwrap();
        assert_eq!(short, ts);

        assert!(parse_frame_timestamp("himawari_20260114_0810.npy", "NC_H09").is_none());
        assert!(parse_frame_timestamp("NC_H09_2026011_0810_x.npy", "NC_H09").is_none());
        assert!(parse_frame_timestamp("NC_H09_20261314_0810_x.npy", "NC_H09").is_none());
        assert!(parse_frame_timestamp("NC_H09_2026011a_0810_x.npy", "NC_H09").is_none());
    }

    #[test]
    fn test_scan_prefers_cache_and_ignores_noise() {
        let cache = TempDir::new().unwrap();
        let raw = TempDir::new().unwrap();
        let grid = Array2::from_elem((8, 8), 250.0f32);

        write_grid(&raw.path().join("NC_H09_20260114_0800_R21_FLDK.npy"), &grid);
        write_grid(&raw.path().join("NC_H09_20260114_0810_R21_FLDK.npy"), &grid);
        write_grid(&cache.path().join("NC_H09_20260114_0810_R21_FLDK.npy"), &grid);
        std::fs::write(raw.path().join("README.txt"), "not a frame").unwrap();
        std::fs::write(raw.path().join("NC_H09_bad_name.npy"), "junk").unwrap();

        let index = SatelliteFrameIndex::scan(
            config_for(cache.path(), raw.path()),
            &GridProjection::default(),
            &GeoRegion::SINGAPORE,
        );

        assert_eq!(index.len(), 2);
        let t0800 = Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap();
        let t0810 = Utc.with_ymd_and_hms(2026, 1, 14, 8, 10, 0).unwrap();
        assert!(matches!(index.source(t0800), Some(FrameSource::Raw(_))));
        assert!(matches!(index.source(t0810), Some(FrameSource::Cached(_))));
        assert!(!index.has_frame(Utc.with_ymd_and_hms(2026, 1, 14, 8, 20, 0).unwrap()));
    }

    #[test]
    fn test_missing_directories_yield_empty_index() {
        let index = SatelliteFrameIndex::scan(
            config_for(Path::new("/nonexistent/cache"), Path::new("/nonexistent/raw")),
            &GridProjection::default(),
            &GeoRegion::SINGAPORE,
        );
        assert!(index.is_empty());
        assert!(index
            .load(Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap())
            .is_none());
    }

    #[test]
    fn test_corrupt_frame_loads_as_missing() {
        let cache = TempDir::new().unwrap();
        let raw = TempDir::new().unwrap();
        std::fs::write(
            cache.path().join("NC_H09_20260114_0800_R21_FLDK.npy"),
            b"definitely not numpy",
        )
        .unwrap();

        let index = SatelliteFrameIndex::scan(
            config_for(cache.path(), raw.path()),
            &GridProjection::default(),
            &GeoRegion::SINGAPORE,
        );
        let ts = Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap();
        assert!(index.has_frame(ts));
        assert!(index.load(ts).is_none());
    }

    #[test]
    fn test_full_disk_raw_frame_is_cropped_and_resized() {
        let cache = TempDir::new().unwrap();
        let raw = TempDir::new().unwrap();
        // A small synthetic "full disk" grid with a projection scaled to fit it.
        let projection = GridProjection::builder()
            .lat_max(2.0)
            .lon_min(103.0)
            .resolution(0.05)
            .build();
        let grid = Array2::from_shape_fn((40, 40), |(r, c)| if r < 20 && c < 20 { 300.0 } else { 200.0 });
        write_grid(&raw.path().join("NC_H09_20260114_0800_R21_FLDK.npy"), &grid);

        let index = SatelliteFrameIndex::scan(
            config_for(cache.path(), raw.path()),
            &projection,
            &GeoRegion::SINGAPORE,
        );
        let crop_box = index.crop_box();
        assert!(crop_box.fits_within(40, 40));

        let frame = index
            .load(Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap())
            .unwrap();
        assert_eq!(frame.kelvin.dim(), (8, 8));
        let normalized = frame.normalized();
        for v in normalized.iter() {
            assert!((0.0..=1.0).contains(v));
        }
    }

    #[test]
    fn test_full_disk_frame_outside_crop_is_missing() {
        let cache = TempDir::new().unwrap();
        let raw = TempDir::new().unwrap();
        // Default projection puts the Singapore crop thousands of pixels in.
        let grid = Array2::from_elem((30, 30), 280.0f32);
        write_grid(&raw.path().join("NC_H09_20260114_0800_R21_FLDK.npy"), &grid);

        let index = SatelliteFrameIndex::scan(
            config_for(cache.path(), raw.path()),
            &GridProjection::default(),
            &GeoRegion::SINGAPORE,
        );
        assert!(index
            .load(Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap())
            .is_none());
    }

    /// Reads files holding a single byte as a grid filled with that value.
    struct ByteFrameDecoder;

    impl RawFrameDecoder for ByteFrameDecoder {
        fn extension(&self) -> &str {
            "bin"
        }

        fn decode(&self, path: &Path) -> Result<Array2<f32>, FrameError> {
            let bytes = std::fs::read(path).map_err(|e| FrameError::Open(path.to_path_buf(), e))?;
            let value = *bytes.first().ok_or_else(|| FrameError::Empty(path.to_path_buf()))?;
            Ok(Array2::from_elem((4, 4), value as f32))
        }
    }

    #[test]
    fn test_raw_files_are_routed_by_extension() {
        let cache = TempDir::new().unwrap();
        let raw = TempDir::new().unwrap();
        write_grid(
            &raw.path().join("NC_H09_20260114_0800_R21_FLDK.npy"),
            &Array2::from_elem((8, 8), 250.0f32),
        );
        std::fs::write(raw.path().join("NC_H09_20260114_0810_R21_FLDK.bin"), [240u8]).unwrap();
        std::fs::write(raw.path().join("NC_H09_20260114_0820_R21_FLDK.grib"), b"x").unwrap();

        let decoders: Vec<Arc<dyn RawFrameDecoder>> =
            vec![Arc::new(NpyFrameDecoder), Arc::new(ByteFrameDecoder)];
        let index = SatelliteFrameIndex::scan_with_decoders(
            config_for(cache.path(), raw.path()),
            &GridProjection::default(),
            &GeoRegion::SINGAPORE,
            decoders,
        );

        assert_eq!(index.len(), 2);
        let t0800 = Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap();
        let t0810 = Utc.with_ymd_and_hms(2026, 1, 14, 8, 10, 0).unwrap();
        let t0820 = Utc.with_ymd_and_hms(2026, 1, 14, 8, 20, 0).unwrap();
        assert_eq!(index.load(t0800).unwrap().kelvin[[0, 0]], 250.0);
        let byte_frame = index.load(t0810).unwrap();
        assert_eq!(byte_frame.kelvin.dim(), (8, 8));
        assert_eq!(byte_frame.kelvin[[7, 7]], 240.0);
        assert!(!index.has_frame(t0820));

        // The default set has no `.bin` decoder.
        let npy_only = SatelliteFrameIndex::scan(
            config_for(cache.path(), raw.path()),
            &GridProjection::default(),
            &GeoRegion::SINGAPORE,
        );
        assert!(npy_only.has_frame(t0800));
        assert!(!npy_only.has_frame(t0810));
    }

    #[test]
    fn test_float64_cached_frame_is_accepted() {
        let cache = TempDir::new().unwrap();
        let raw = TempDir::new().unwrap();
        let grid = Array2::from_elem((8, 8), 290.0f64);
        let file = File::create(cache.path().join("NC_H09_20260114_0800_R21_FLDK.npy")).unwrap();
        grid.write_npy(file).unwrap();

        let index = SatelliteFrameIndex::scan(
            config_for(cache.path(), raw.path()),
            &GridProjection::default(),
            &GeoRegion::SINGAPORE,
        );
        let frame = index
            .load(Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap())
            .unwrap();
        assert_eq!(frame.kelvin[[3, 3]], 290.0);
        assert!((frame.normalized()[[3, 3]] - 0.9).abs() < 1e-6);
    }
}
