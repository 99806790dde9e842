//! Loads the raw sensor table into [`SensorReading`]s.
//!
//! Expected columns: `timestamp, sensor_id, temperature, rainfall, humidity, pm25`.
//! Extra columns are ignored. Numeric cells that fail to parse become missing
//! values; rows with an unparseable timestamp or no station id are skipped.

use crate::sensors::error::SensorDataError;
use crate::types::sensor::SensorReading;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};
use log::{debug, info, warn};
use polars::prelude::*;
use std::path::{Path, PathBuf};

pub const COL_TIMESTAMP: &str = "timestamp";
pub const COL_STATION: &str = "sensor_id";
pub const COL_TEMPERATURE: &str = "temperature";
pub const COL_RAINFALL: &str = "rainfall";
pub const COL_HUMIDITY: &str = "humidity";
pub const COL_PM25: &str = "pm25";

const REQUIRED_COLUMNS: [&str; 6] = [
    COL_TIMESTAMP,
    COL_STATION,
    COL_TEMPERATURE,
    COL_RAINFALL,
    COL_HUMIDITY,
    COL_PM25,
];

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const ZONED_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Reads sensor tables, normalising every timestamp to the network's local wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SensorReader {
    offset: FixedOffset,
}

impl SensorReader {
    /// `offset` is the sensor network's UTC offset. Naive timestamps are assumed
    /// to be in it already; zoned ones are converted into it.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn read_csv(&self, path: &Path) -> Result<Vec<SensorReading>, SensorDataError> {
        info!("Reading sensor data from {}", path.display());
        // Every column is read as text; bad numeric cells become nulls in `from_dataframe`.
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .map_err(|e| SensorDataError::CsvRead {
                path: path.to_path_buf(),
                source: e,
            })?
            .finish()
            .map_err(|e| SensorDataError::CsvRead {
                path: path.to_path_buf(),
                source: e,
            })?;

        self.from_dataframe(df, &path.display().to_string())
    }

    /// Reads the CSV on a blocking thread.
    pub async fn read_csv_async(
        &self,
        path: impl Into<PathBuf>,
    ) -> Result<Vec<SensorReading>, SensorDataError> {
        let reader = *self;
        let path = path.into();
        tokio::task::spawn_blocking(move || reader.read_csv(&path)).await?
    }

    /// Converts an already-loaded table. `source_name` is only used in errors and logs.
    pub fn from_dataframe(
        &self,
        df: DataFrame,
        source_name: &str,
    ) -> Result<Vec<SensorReading>, SensorDataError> {
        for column in REQUIRED_COLUMNS {
            if df.column(column).is_err() {
                return Err(SensorDataError::MissingColumn {
                    source_name: source_name.to_string(),
                    column: column.to_string(),
                });
            }
        }

        let df = df
            .lazy()
            .select([
                col(COL_STATION).cast(DataType::String),
                col(COL_TIMESTAMP).cast(DataType::String),
                col(COL_TEMPERATURE).cast(DataType::Float64),
                col(COL_RAINFALL).cast(DataType::Float64),
                col(COL_HUMIDITY).cast(DataType::Float64),
                col(COL_PM25).cast(DataType::Float64),
            ])
            .collect()?;

        let stations = df.column(COL_STATION)?.str()?;
        let timestamps = df.column(COL_TIMESTAMP)?.str()?;
        let temperature = df.column(COL_TEMPERATURE)?.f64()?;
        let rainfall = df.column(COL_RAINFALL)?.f64()?;
        let humidity = df.column(COL_HUMIDITY)?.f64()?;
        let pm25 = df.column(COL_PM25)?.f64()?;

        let mut readings = Vec::with_capacity(df.height());
        let mut skipped = 0usize;
        for i in 0..df.height() {
            let station = stations.get(i).map(str::trim).filter(|s| !s.is_empty());
            let timestamp = timestamps
                .get(i)
                .and_then(|raw| parse_timestamp(raw, self.offset));
            let (Some(station), Some(timestamp)) = (station, timestamp) else {
                skipped += 1;
                continue;
            };
            readings.push(SensorReading {
                station_id: station.to_string(),
                timestamp,
                temperature: finite(temperature.get(i)),
                rainfall: finite(rainfall.get(i)),
                humidity: finite(humidity.get(i)),
                pm25: finite(pm25.get(i)),
            });
        }

        if skipped > 0 {
            warn!(
                "Skipped {} sensor rows from '{}' with a missing station id or unparseable timestamp",
                skipped, source_name
            );
        }
        debug!("Read {} sensor readings from '{}'", readings.len(), source_name);
        Ok(readings)
    }
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

/// Parses a sensor timestamp into wall-clock time at `offset`.
///
/// Zoned timestamps (RFC 3339 or `YYYY-MM-DD HH:MM:SS+HH:MM`) are converted; naive
/// ones are taken as already being local to `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(zoned) = DateTime::parse_from_rfc3339(raw) {
        return Some(zoned.with_timezone(&offset).naive_local());
    }
    for format in ZONED_FORMATS {
        if let Ok(zoned) = DateTime::parse_from_str(raw, format) {
            return Some(zoned.with_timezone(&offset).naive_local());
        }
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// Keeps only readings within `days` of the newest reading (inclusive).
pub fn retain_recent(readings: &mut Vec<SensorReading>, days: u32) {
    let Some(latest) = readings.iter().map(|r| r.timestamp).max() else {
        return;
    };
    let cutoff = latest - TimeDelta::days(i64::from(days));
    let before = readings.len();
    readings.retain(|r| r.timestamp >= cutoff);
    let dropped = before - readings.len();
    if dropped > 0 {
        info!(
            "Dropped {} sensor readings older than {} ({} day window)",
            dropped, cutoff, days
        );
    }
}
