//! The single rule mapping sensor wall-clock time onto satellite capture time.
//!
//! Training-set construction and serving both go through [`TimeAlignment`]; there
//! is no other place where the sensor offset is applied.

use crate::dataset::error::DatasetError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Rows in one model input window.
    #[builder(default = 6)]
    pub seq_len: usize,
    /// Distance, in rows, from the window's last row to the target row.
    #[builder(default = 1)]
    pub horizon: usize,
    /// Resampling cadence of the sensor series and of the satellite feed.
    #[builder(default = 10)]
    pub bucket_minutes: u32,
    /// UTC offset of the sensor network's clock. Naive sensor timestamps are in this offset.
    #[builder(default = 8)]
    pub sensor_utc_offset_hours: i32,
    /// Readings older than this many days before the newest one are ignored.
    /// `None` keeps the full history.
    #[builder(required, default = Some(30))]
    pub max_history_days: Option<u32>,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AlignmentConfig {
    pub fn sensor_offset(&self) -> Result<FixedOffset, DatasetError> {
        FixedOffset::east_opt(self.sensor_utc_offset_hours * 3600)
            .ok_or(DatasetError::InvalidUtcOffset(self.sensor_utc_offset_hours))
    }

    pub fn bucket(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.bucket_minutes))
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        if self.seq_len == 0 {
            return Err(DatasetError::InvalidParameters(
                "seq_len must be at least 1".into(),
            ));
        }
        if self.horizon == 0 {
            return Err(DatasetError::InvalidParameters(
                "horizon must be at least 1".into(),
            ));
        }
        if self.bucket_minutes == 0 {
            return Err(DatasetError::InvalidParameters(
                "bucket_minutes must be at least 1".into(),
            ));
        }
        self.sensor_offset().map(|_| ())
    }
}

/// Converts between sensor-local buckets and UTC satellite frame timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAlignment {
    offset: FixedOffset,
    bucket_ms: i64,
}

impl TimeAlignment {
    pub fn new(config: &AlignmentConfig) -> Result<Self, DatasetError> {
        config.validate()?;
        Ok(Self {
            offset: config.sensor_offset()?,
            bucket_ms: config.bucket().num_milliseconds(),
        })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// UTC timestamp of the satellite frame that pairs with a sensor-local time.
    ///
    /// The local time is floored to its bucket first, so any reading inside
    /// `08:00..08:10` local maps to the same frame.
    pub fn frame_timestamp(&self, sensor_local: NaiveDateTime) -> DateTime<Utc> {
        let ms = sensor_local.and_utc().timestamp_millis();
        let floored = ms.div_euclid(self.bucket_ms) * self.bucket_ms;
        let local_floor = DateTime::from_timestamp_millis(floored)
            .map(|dt| dt.naive_utc())
            .unwrap_or(sensor_local);
        (local_floor - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }

    /// Sensor-local wall clock time for a UTC instant.
    pub fn sensor_local(&self, utc: DateTime<Utc>) -> NaiveDateTime {
        utc.with_timezone(&self.offset).naive_local()
    }
}
