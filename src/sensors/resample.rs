//! Fixed-cadence resampling of raw sensor readings.
//!
//! Buckets are aligned to absolute wall-clock boundaries (`08:00`, `08:10`, ...),
//! not to the first reading. Temperature, humidity and PM2.5 are averaged over the
//! bucket, rainfall is summed. A bucket missing any averaged quantity is dropped
//! rather than filled.

use crate::sensors::error::SensorDataError;
use crate::sensors::reader::{COL_HUMIDITY, COL_PM25, COL_RAINFALL, COL_STATION, COL_TEMPERATURE};
use crate::types::sensor::{ResampledRow, ResampledSeries, SensorReading};
use chrono::{DateTime, NaiveDateTime, TimeDelta};
use log::{debug, warn};
use polars::prelude::*;

const COL_TS_MS: &str = "ts_ms";
const COL_BUCKET: &str = "bucket";
const COL_READINGS: &str = "readings";

pub const DEFAULT_INTERVAL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy)]
pub struct SensorSeriesResampler {
    interval_ms: i64,
}

impl Default for SensorSeriesResampler {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MINUTES * 60_000,
        }
    }
}

impl SensorSeriesResampler {
    pub fn new(interval: TimeDelta) -> Result<Self, SensorDataError> {
        let interval_ms = interval.num_milliseconds();
        if interval_ms <= 0 {
            return Err(SensorDataError::InvalidInterval(interval.num_seconds()));
        }
        Ok(Self { interval_ms })
    }

    pub fn interval(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.interval_ms)
    }

    /// Start of the bucket that contains `timestamp`.
    pub fn bucket_start(&self, timestamp: NaiveDateTime) -> NaiveDateTime {
        let floored = self.floor_ms(timestamp.and_utc().timestamp_millis());
        DateTime::from_timestamp_millis(floored)
            .map(|dt| dt.naive_utc())
            .unwrap_or(timestamp)
    }

    fn floor_ms(&self, ms: i64) -> i64 {
        ms.div_euclid(self.interval_ms) * self.interval_ms
    }

    /// Resamples one station's readings. Readings tagged with another station id are ignored.
    pub fn resample(
        &self,
        station_id: &str,
        readings: &[SensorReading],
    ) -> Result<ResampledSeries, SensorDataError> {
        let own: Vec<SensorReading> = readings
            .iter()
            .filter(|r| r.station_id == station_id)
            .cloned()
            .collect();
        if own.len() != readings.len() {
            warn!(
                "Ignoring {} readings not belonging to station {}",
                readings.len() - own.len(),
                station_id
            );
        }
        let series = self
            .resample_all(&own)?
            .into_iter()
            .next()
            .unwrap_or_else(|| ResampledSeries::new(station_id, Vec::new()));
        Ok(series)
    }

    /// Resamples every station present in `readings`, ordered by station id.
    ///
    /// The result depends only on the set of readings, not on their order.
    pub fn resample_all(
        &self,
        readings: &[SensorReading],
    ) -> Result<Vec<ResampledSeries>, SensorDataError> {
        if readings.is_empty() {
            return Ok(Vec::new());
        }

        let station: Vec<&str> = readings.iter().map(|r| r.station_id.as_str()).collect();
        let ts_ms: Vec<i64> = readings
            .iter()
            .map(|r| r.timestamp.and_utc().timestamp_millis())
            .collect();
        let bucket: Vec<i64> = ts_ms.iter().map(|&ms| self.floor_ms(ms)).collect();
        let temperature: Vec<Option<f64>> = readings.iter().map(|r| r.temperature).collect();
        let rainfall: Vec<Option<f64>> = readings.iter().map(|r| r.rainfall).collect();
        let humidity: Vec<Option<f64>> = readings.iter().map(|r| r.humidity).collect();
        let pm25: Vec<Option<f64>> = readings.iter().map(|r| r.pm25).collect();

        let df = df!(
            COL_STATION => station,
            COL_TS_MS => ts_ms,
            COL_BUCKET => bucket,
            COL_TEMPERATURE => temperature,
            COL_RAINFALL => rainfall,
            COL_HUMIDITY => humidity,
            COL_PM25 => pm25,
        )?;

        let aggregated = df
            .lazy()
            // Fix the in-group order so float sums do not depend on input order.
            .sort([COL_STATION, COL_TS_MS], SortMultipleOptions::default())
            .group_by_stable([col(COL_STATION), col(COL_BUCKET)])
            .agg([
                col(COL_TEMPERATURE).mean(),
                col(COL_RAINFALL).sum(),
                col(COL_HUMIDITY).mean(),
                col(COL_PM25).mean(),
                col(COL_TS_MS).count().cast(DataType::Int64).alias(COL_READINGS),
            ])
            .filter(
                col(COL_TEMPERATURE)
                    .is_not_null()
                    .and(col(COL_HUMIDITY).is_not_null())
                    .and(col(COL_PM25).is_not_null()),
            )
            .sort([COL_STATION, COL_BUCKET], SortMultipleOptions::default())
            .collect()?;

        let series = Self::collect_series(&aggregated)?;
        debug!(
            "Resampled {} readings into {} buckets across {} stations",
            readings.len(),
            aggregated.height(),
            series.len()
        );
        Ok(series)
    }

    fn collect_series(df: &DataFrame) -> Result<Vec<ResampledSeries>, SensorDataError> {
        let stations = df.column(COL_STATION)?.str()?;
        let buckets = df.column(COL_BUCKET)?.i64()?;
        let temperature = df.column(COL_TEMPERATURE)?.f64()?;
        let rainfall = df.column(COL_RAINFALL)?.f64()?;
        let humidity = df.column(COL_HUMIDITY)?.f64()?;
        let pm25 = df.column(COL_PM25)?.f64()?;
        let counts = df.column(COL_READINGS)?.i64()?;

        let mut out: Vec<ResampledSeries> = Vec::new();
        for i in 0..df.height() {
            let (Some(station), Some(bucket)) = (stations.get(i), buckets.get(i)) else {
                continue;
            };
            let (Some(temperature), Some(humidity), Some(pm25)) =
                (temperature.get(i), humidity.get(i), pm25.get(i))
            else {
                continue;
            };
            let Some(timestamp) = DateTime::from_timestamp_millis(bucket).map(|dt| dt.naive_utc())
            else {
                continue;
            };
            let row = ResampledRow {
                timestamp,
                temperature,
                rainfall: rainfall.get(i).unwrap_or(0.0),
                humidity,
                pm25,
                readings: counts
                    .get(i)
                    .and_then(|c| u32::try_from(c).ok())
                    .unwrap_or(0),
            };

            match out.last_mut() {
                Some(series) if series.station_id == station => series.rows.push(row),
                _ => out.push(ResampledSeries::new(station, vec![row])),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 14)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    fn reading(station: &str, ts: NaiveDateTime, temp: f64, rain: f64) -> SensorReading {
        SensorReading {
            station_id: station.to_string(),
            timestamp: ts,
            temperature: Some(temp),
            rainfall: Some(rain),
            humidity: Some(80.0),
            pm25: Some(12.0),
        }
    }

    #[test]
    fn test_bucket_start_is_absolute() {
        let resampler = SensorSeriesResampler::default();
        assert_eq!(resampler.bucket_start(at(8, 7, 59)), at(8, 0, 0));
        assert_eq!(resampler.bucket_start(at(8, 10, 0)), at(8, 10, 0));
        assert_eq!(resampler.bucket_start(at(23, 59, 59)), at(23, 50, 0));
    }

    #[test]
    fn test_mean_and_sum_per_bucket() {
        let readings = vec![
            reading("S50", at(8, 1, 0), 28.0, 0.2),
            reading("S50", at(8, 6, 0), 30.0, 0.4),
            reading("S50", at(8, 12, 0), 27.0, 1.0),
        ];
        let series = SensorSeriesResampler::default()
            .resample("S50", &readings)
            .unwrap();

        assert_eq!(series.len(), 2);
        let first = &series.rows[0];
        assert_eq!(first.timestamp, at(8, 0, 0));
        assert_relative_eq!(first.temperature, 29.0);
        assert_relative_eq!(first.rainfall, 0.6, epsilon = 1e-12);
        assert_eq!(first.readings, 2);
        assert_eq!(series.rows[1].timestamp, at(8, 10, 0));
    }

    #[test]
    fn test_gaps_are_not_filled() {
        let readings = vec![
            reading("S50", at(8, 1, 0), 28.0, 0.0),
            reading("S50", at(8, 41, 0), 28.0, 0.0),
        ];
        let series = SensorSeriesResampler::default()
            .resample("S50", &readings)
            .unwrap();
        let stamps: Vec<_> = series.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![at(8, 0, 0), at(8, 40, 0)]);
    }

    #[test]
    fn test_alternate_empty_buckets_are_dropped() {
        // Readings in buckets 0, 2 and 4; none in 1 and 3.
        let readings = vec![
            reading("S50", at(8, 3, 0), 28.0, 0.1),
            reading("S50", at(8, 25, 0), 29.0, 0.2),
            reading("S50", at(8, 44, 0), 30.0, 0.3),
        ];
        let series = SensorSeriesResampler::default()
            .resample("S50", &readings)
            .unwrap();
        let stamps: Vec<_> = series.rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![at(8, 0, 0), at(8, 20, 0), at(8, 40, 0)]);
        assert!(series.rows.iter().all(|r| r.readings == 1));
    }

    #[test]
    fn test_bucket_missing_an_average_is_dropped() {
        let mut no_humidity = reading("S50", at(8, 12, 0), 28.0, 0.0);
        no_humidity.humidity = None;
        let readings = vec![reading("S50", at(8, 1, 0), 28.0, 0.0), no_humidity];
        let series = SensorSeriesResampler::default()
            .resample("S50", &readings)
            .unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.rows[0].timestamp, at(8, 0, 0));
    }

    #[test]
    fn test_order_independent_and_deterministic() {
        let readings = vec![
            reading("S50", at(8, 1, 0), 28.1, 0.1),
            reading("S107", at(8, 2, 0), 27.3, 0.3),
            reading("S50", at(8, 3, 0), 28.7, 0.7),
            reading("S50", at(8, 14, 0), 29.2, 0.2),
            reading("S107", at(8, 19, 0), 26.9, 0.9),
        ];
        let mut shuffled = readings.clone();
        shuffled.reverse();
        shuffled.swap(0, 2);

        let resampler = SensorSeriesResampler::default();
        let a = resampler.resample_all(&readings).unwrap();
        let b = resampler.resample_all(&shuffled).unwrap();
        let c = resampler.resample_all(&readings).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.len(), 2);
        assert_eq!(a[0].station_id, "S107");
        assert_eq!(a[1].station_id, "S50");
    }

    #[test]
    fn test_empty_input() {
        let series = SensorSeriesResampler::default()
            .resample("S50", &[])
            .unwrap();
        assert!(series.is_empty());
        assert_eq!(series.station_id, "S50");
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        assert!(SensorSeriesResampler::new(TimeDelta::zero()).is_err());
    }
}
