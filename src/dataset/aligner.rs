//! Enumerates training samples where sensor history and satellite imagery overlap.

use crate::dataset::alignment::{AlignmentConfig, TimeAlignment};
use crate::dataset::error::DatasetError;
use crate::satellite::frame_index::SatelliteFrameIndex;
use crate::sensors::store::SensorStore;
use crate::types::sensor::ResampledSeries;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

/// Anything that can answer "is there a satellite frame at this UTC time?".
pub trait FrameAvailability {
    fn has_frame(&self, timestamp: DateTime<Utc>) -> bool;
}

impl FrameAvailability for SatelliteFrameIndex {
    fn has_frame(&self, timestamp: DateTime<Utc>) -> bool {
        SatelliteFrameIndex::has_frame(self, timestamp)
    }
}

impl FrameAvailability for BTreeSet<DateTime<Utc>> {
    fn has_frame(&self, timestamp: DateTime<Utc>) -> bool {
        self.contains(&timestamp)
    }
}

/// A training sample described by row indices into one station's resampled series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub station_id: String,
    /// Rows fed to the model, `seq_len` long.
    pub window: Range<usize>,
    /// Row whose rainfall is the target.
    pub target_index: usize,
    /// Satellite frame paired with the window's last row.
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TemporalAligner {
    seq_len: usize,
    horizon: usize,
    alignment: TimeAlignment,
}

impl TemporalAligner {
    pub fn new(config: &AlignmentConfig) -> Result<Self, DatasetError> {
        Ok(Self {
            seq_len: config.seq_len,
            horizon: config.horizon,
            alignment: TimeAlignment::new(config)?,
        })
    }

    pub fn alignment(&self) -> &TimeAlignment {
        &self.alignment
    }

    pub fn seq_len(&self) -> usize {
        self.seq_len
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Samples for every station in the store, grouped by station id.
    pub fn align(&self, store: &SensorStore, frames: &impl FrameAvailability) -> Vec<TrainingSample> {
        let mut samples = Vec::new();
        let mut short_stations = 0usize;
        for series in store.iter() {
            if series.len() < self.seq_len + self.horizon {
                short_stations += 1;
                continue;
            }
            samples.extend(self.align_series(series, frames));
        }
        if short_stations > 0 {
            info!(
                "Excluded {} stations with fewer than {} resampled rows",
                short_stations,
                self.seq_len + self.horizon
            );
        }
        info!(
            "Aligned {} training samples across {} stations",
            samples.len(),
            store.len() - short_stations
        );
        samples
    }

    /// Samples for a single station.
    ///
    /// The window ending just before row `i` is kept when a frame exists at row
    /// `i - 1`, for every `i` in `seq_len..=len - horizon`. Frames for earlier
    /// rows of the window are not required.
    pub fn align_series(
        &self,
        series: &ResampledSeries,
        frames: &impl FrameAvailability,
    ) -> Vec<TrainingSample> {
        let len = series.len();
        if len < self.seq_len + self.horizon {
            return Vec::new();
        }

        let mut samples = Vec::new();
        let mut missing = 0usize;
        for i in self.seq_len..=len - self.horizon {
            let window_end = self.alignment.frame_timestamp(series.rows[i - 1].timestamp);
            if !frames.has_frame(window_end) {
                missing += 1;
                continue;
            }
            samples.push(TrainingSample {
                station_id: series.station_id.clone(),
                window: i - self.seq_len..i,
                target_index: i + self.horizon - 1,
                window_end,
            });
        }
        debug!(
            "Station {}: {} samples, {} skipped for missing frames",
            series.station_id,
            samples.len(),
            missing
        );
        samples
    }
}
