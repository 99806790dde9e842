//! Ground sensor readings and the regular series derived from them.
//!
//! All timestamps here are wall-clock times in the sensor network's local offset
//! (see [`crate::AlignmentConfig::sensor_utc_offset_hours`]). Conversion to the
//! satellite's UTC clock happens only in [`crate::TimeAlignment`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One raw row from the sensor table. Any quantity may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub station_id: String,
    pub timestamp: NaiveDateTime,
    /// Air temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Rainfall in millimetres since the previous reading.
    pub rainfall: Option<f64>,
    /// Relative humidity in percent.
    pub humidity: Option<f64>,
    /// PM2.5 concentration in µg/m³.
    pub pm25: Option<f64>,
}

/// One fixed-cadence bucket of a [`ResampledSeries`].
///
/// Only buckets with at least one raw reading and a value for every averaged
/// quantity exist, so the fields are not optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledRow {
    /// Start of the bucket.
    pub timestamp: NaiveDateTime,
    /// Mean temperature.
    pub temperature: f64,
    /// Total rainfall.
    pub rainfall: f64,
    /// Mean humidity.
    pub humidity: f64,
    /// Mean PM2.5.
    pub pm25: f64,
    /// Number of raw readings that fell into the bucket.
    pub readings: u32,
}

/// A station's readings resampled to a fixed cadence, ascending by time.
///
/// Gaps are not filled: a bucket with no usable readings is simply absent, so
/// consecutive rows are not necessarily one bucket apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampledSeries {
    pub station_id: String,
    pub rows: Vec<ResampledRow>,
}

impl ResampledSeries {
    pub fn new(station_id: impl Into<String>, rows: Vec<ResampledRow>) -> Self {
        Self {
            station_id: station_id.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.first().map(|row| row.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.rows.last().map(|row| row.timestamp)
    }

    /// Index of the row whose bucket starts exactly at `timestamp`.
    pub fn position(&self, timestamp: NaiveDateTime) -> Option<usize> {
        self.rows
            .binary_search_by_key(&timestamp, |row| row.timestamp)
            .ok()
    }

    /// Index of the row closest in time to `timestamp`; ties go to the earlier row.
    pub fn nearest_index(&self, timestamp: NaiveDateTime) -> Option<usize> {
        if self.rows.is_empty() {
            return None;
        }
        let idx = self.rows.partition_point(|row| row.timestamp < timestamp);
        if idx == 0 {
            return Some(0);
        }
        if idx == self.rows.len() {
            return Some(idx - 1);
        }
        let before = timestamp - self.rows[idx - 1].timestamp;
        let after = self.rows[idx].timestamp - timestamp;
        if after < before {
            Some(idx)
        } else {
            Some(idx - 1)
        }
    }

    /// The `len` rows ending at (and including) `end_index`.
    pub fn window_ending_at(&self, end_index: usize, len: usize) -> Option<&[ResampledRow]> {
        if len == 0 || end_index >= self.rows.len() || end_index + 1 < len {
            return None;
        }
        Some(&self.rows[end_index + 1 - len..=end_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 1, 14)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn row(timestamp: NaiveDateTime, rainfall: f64) -> ResampledRow {
        ResampledRow {
            timestamp,
            temperature: 28.0,
            rainfall,
            humidity: 80.0,
            pm25: 20.0,
            readings: 1,
        }
    }

    fn series() -> ResampledSeries {
        ResampledSeries::new(
            "S50",
            vec![
                row(at(8, 0), 0.0),
                row(at(8, 10), 0.2),
                row(at(8, 40), 0.4),
                row(at(8, 50), 0.6),
            ],
        )
    }

    #[test]
    fn test_position_is_exact() {
        let s = series();
        assert_eq!(s.position(at(8, 40)), Some(2));
        assert_eq!(s.position(at(8, 20)), None);
    }

    #[test]
    fn test_nearest_index() {
        let s = series();
        assert_eq!(s.nearest_index(at(7, 0)), Some(0));
        assert_eq!(s.nearest_index(at(8, 20)), Some(1));
        // 08:25 is equidistant from 08:10 and 08:40 -> earlier row.
        assert_eq!(s.nearest_index(at(8, 25)), Some(1));
        assert_eq!(s.nearest_index(at(8, 30)), Some(2));
        assert_eq!(s.nearest_index(at(12, 0)), Some(3));
        assert_eq!(ResampledSeries::new("empty", vec![]).nearest_index(at(8, 0)), None);
    }

    #[test]
    fn test_window_ending_at() {
        let s = series();
        let window = s.window_ending_at(3, 2).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].timestamp, at(8, 40));
        assert_eq!(window[1].timestamp, at(8, 50));

        assert!(s.window_ending_at(2, 4).is_none());
        assert!(s.window_ending_at(4, 1).is_none());
        assert_eq!(s.window_ending_at(3, 4).unwrap().len(), 4);
    }
}
