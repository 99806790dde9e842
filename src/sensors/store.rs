use crate::sensors::error::SensorDataError;
use crate::sensors::reader::{retain_recent, SensorReader};
use crate::sensors::resample::SensorSeriesResampler;
use crate::types::sensor::{ResampledSeries, SensorReading};
use chrono::NaiveDateTime;
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

/// Resampled series for every known station, keyed by station id.
#[derive(Debug, Clone, Default)]
pub struct SensorStore {
    series: BTreeMap<String, ResampledSeries>,
}

impl SensorStore {
    pub fn from_series(series: impl IntoIterator<Item = ResampledSeries>) -> Self {
        let mut store = Self::default();
        for s in series {
            store.insert(s);
        }
        store
    }

    pub fn from_readings(
        readings: &[SensorReading],
        resampler: &SensorSeriesResampler,
    ) -> Result<Self, SensorDataError> {
        Ok(Self::from_series(resampler.resample_all(readings)?))
    }

    /// Reads, trims to the most recent `history_days` (when given) and resamples a sensor CSV.
    pub fn load_csv(
        path: &Path,
        reader: &SensorReader,
        resampler: &SensorSeriesResampler,
        history_days: Option<u32>,
    ) -> Result<Self, SensorDataError> {
        let mut readings = reader.read_csv(path)?;
        if readings.is_empty() {
            return Err(SensorDataError::NoUsableRows(path.display().to_string()));
        }
        if let Some(days) = history_days {
            retain_recent(&mut readings, days);
        }
        let store = Self::from_readings(&readings, resampler)?;
        info!(
            "Loaded {} stations ({} buckets) from {}",
            store.len(),
            store.bucket_count(),
            path.display()
        );
        Ok(store)
    }

    /// Adds or replaces a station's series. Empty series are not stored.
    pub fn insert(&mut self, series: ResampledSeries) {
        if series.is_empty() {
            self.series.remove(&series.station_id);
        } else {
            self.series.insert(series.station_id.clone(), series);
        }
    }

    pub fn get(&self, station_id: &str) -> Option<&ResampledSeries> {
        self.series.get(station_id)
    }

    pub fn contains(&self, station_id: &str) -> bool {
        self.series.contains_key(station_id)
    }

    pub fn station_ids(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResampledSeries> {
        self.series.values()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.series.values().map(ResampledSeries::len).sum()
    }

    /// Newest bucket across all stations.
    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        self.series
            .values()
            .filter_map(ResampledSeries::last_timestamp)
            .max()
    }
}
