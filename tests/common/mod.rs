#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use ndarray::{Array2, ArrayView2};
use ndarray_npy::WriteNpyExt;
use nowcast::{
    frame_key, FrameStoreConfig, GeoRegion, GeocodeError, Geocoder, GridProjection, LatLon,
    ModelError, RainfallModel, ResampledRow, ResampledSeries, SatelliteFrameIndex, TimeAlignment,
    AlignmentConfig,
};
use std::fs::File;
use std::path::Path;

pub const KM_PER_DEGREE: f64 = 111.0;

/// Predicts that the next bucket repeats the newest rainfall in the window.
pub struct PersistenceModel;

impl RainfallModel for PersistenceModel {
    fn predict(
        &self,
        _satellite: ArrayView2<f32>,
        sensor: ArrayView2<f32>,
    ) -> Result<f32, ModelError> {
        let last = sensor
            .nrows()
            .checked_sub(1)
            .ok_or_else(|| ModelError("empty window".into()))?;
        Ok(sensor[[last, 1]] * 10.0)
    }
}

/// Knows a single address.
pub struct StubGeocoder;

impl Geocoder for StubGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<LatLon>, GeocodeError> {
        Ok((address == "Orchard Boulevard").then_some(LatLon(1.35, 103.85)))
    }

    async fn reverse(&self, _point: LatLon) -> Result<Option<String>, GeocodeError> {
        Ok(None)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 1, 14)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

pub fn offset_km(origin: LatLon, north_km: f64, east_km: f64) -> LatLon {
    LatLon(
        origin.latitude() + north_km / KM_PER_DEGREE,
        origin.longitude() + east_km / KM_PER_DEGREE,
    )
}

/// `len` consecutive 10-minute rows from [`start`], with constant `rainfall`.
pub fn series(id: &str, len: usize, rainfall: f64) -> ResampledSeries {
    let rows = (0..len)
        .map(|i| ResampledRow {
            timestamp: start() + TimeDelta::minutes(10 * i as i64),
            temperature: 28.0,
            rainfall,
            humidity: 80.0,
            pm25: 20.0,
            readings: 10,
        })
        .collect();
    ResampledSeries::new(id, rows)
}

/// Writes a cached 4x4 frame for every bucket in `[start, start + len * 10min)`.
pub fn write_frames(cache_dir: &Path, len: usize) {
    std::fs::create_dir_all(cache_dir).unwrap();
    let alignment = TimeAlignment::new(&AlignmentConfig::default()).unwrap();
    for i in 0..len {
        let local = start() + TimeDelta::minutes(10 * i as i64);
        let key = frame_key(alignment.frame_timestamp(local));
        let path = cache_dir.join(format!("NC_H09_{}_R21_FLDK.02401_02401.npy", key));
        Array2::from_elem((4, 4), 260.0f32)
            .write_npy(File::create(path).unwrap())
            .unwrap();
    }
}

pub fn frame_config(cache_dir: &Path) -> FrameStoreConfig {
    FrameStoreConfig::builder()
        .cache_dir(cache_dir.to_path_buf())
        .raw_dirs(vec![])
        .output_size(4)
        .build()
}

pub fn frame_index(cache_dir: &Path) -> SatelliteFrameIndex {
    SatelliteFrameIndex::scan(
        frame_config(cache_dir),
        &GridProjection::default(),
        &GeoRegion::SINGAPORE,
    )
}
