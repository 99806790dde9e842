//! Per-station model runs and their fusion into a single forecast.

use crate::dataset::alignment::TimeAlignment;
use crate::dataset::features::ModelInput;
use crate::forecast::model::RainfallModel;
use crate::forecast::outlook::WeatherOutlook;
use crate::forecast::resolver::ResolvedLocation;
use crate::interpolation::idw::idw_with;
use crate::satellite::frame_index::SatelliteFrameIndex;
use crate::sensors::store::SensorStore;
use crate::stations::selector::{ContributingStation, SelectionPath};
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct ForecastConfig {
    /// Selected stations further than this from the query are discarded.
    #[builder(default = 10.0)]
    pub max_radius_km: f64,
    /// Minimum name similarity for a query to resolve to a station name.
    #[builder(default = 0.6)]
    pub fuzzy_cutoff: f64,
    #[builder(default = 2.0)]
    pub idw_power: f64,
    /// A station closer than this is taken to be at the query point.
    #[builder(default = 0.1)]
    pub exact_match_km: f64,
    /// Trained weights; must exist when set.
    #[builder(into)]
    pub model_weights: Option<PathBuf>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// One station's contribution to a forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationEstimate {
    pub station_id: String,
    pub distance_km: f64,
    /// Bucket of the station's series the prediction was made from.
    pub observed_at: NaiveDateTime,
    /// Satellite frame paired with `observed_at`.
    pub frame_time: DateTime<Utc>,
    /// Predicted rainfall for the next bucket, mm.
    pub rainfall: f64,
    /// Current conditions at `observed_at`.
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pm25: Option<f64>,
}

/// Fused values across all contributing stations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedEstimate {
    pub rainfall: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pm25: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub location: ResolvedLocation,
    /// Requested time, in the sensor network's local clock.
    pub target_time: NaiveDateTime,
    pub selection_path: SelectionPath,
    /// Contributing stations, ascending by distance.
    pub stations: Vec<StationEstimate>,
    pub rainfall_mm: f64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pm25: Option<f64>,
    pub outlook: WeatherOutlook,
}

impl Forecast {
    pub fn new(
        location: ResolvedLocation,
        target_time: NaiveDateTime,
        selection_path: SelectionPath,
        stations: Vec<StationEstimate>,
        fused: FusedEstimate,
    ) -> Self {
        Self {
            location,
            target_time,
            selection_path,
            stations,
            rainfall_mm: fused.rainfall,
            temperature: fused.temperature,
            humidity: fused.humidity,
            pm25: fused.pm25,
            outlook: WeatherOutlook::from_rainfall(fused.rainfall),
        }
    }

    pub fn station_ids(&self) -> Vec<&str> {
        self.stations.iter().map(|s| s.station_id.as_str()).collect()
    }
}

/// Runs the model for individual stations.
pub struct StationForecaster<'a> {
    pub sensors: &'a SensorStore,
    pub frames: &'a SatelliteFrameIndex,
    pub model: &'a dyn RainfallModel,
    pub alignment: TimeAlignment,
    pub seq_len: usize,
}

impl StationForecaster<'_> {
    /// Predicts for `station` at `target`, or `None` when the station lacks a full
    /// sensor window or the paired satellite frame.
    ///
    /// When the series has no bucket at exactly `target`, the nearest bucket in the
    /// station's own history is used instead.
    pub fn estimate(
        &self,
        station: &ContributingStation,
        target: NaiveDateTime,
    ) -> Option<StationEstimate> {
        let id = &station.station_id;
        let Some(series) = self.sensors.get(id) else {
            warn!("No sensor data for station {}", id);
            return None;
        };
        let index = series
            .position(target)
            .or_else(|| series.nearest_index(target))?;
        let Some(window) = series.window_ending_at(index, self.seq_len) else {
            warn!(
                "Station {} has {} rows up to {}, need {}",
                id,
                index + 1,
                series.rows[index].timestamp,
                self.seq_len
            );
            return None;
        };
        let current = &series.rows[index];
        if current.timestamp != target {
            debug!(
                "Station {}: no bucket at {}, using nearest {}",
                id, target, current.timestamp
            );
        }

        let frame_time = self.alignment.frame_timestamp(current.timestamp);
        let Some(frame) = self.frames.load(frame_time) else {
            warn!("Station {}: no satellite frame at {}", id, frame_time);
            return None;
        };

        let input = ModelInput::new(&frame, window);
        let rainfall = match self.model.predict(input.satellite.view(), input.sensor.view()) {
            Ok(value) if value.is_finite() => f64::from(value),
            Ok(value) => {
                warn!("Station {}: model returned non-finite {}", id, value);
                return None;
            }
            Err(e) => {
                warn!("Station {}: {}", id, e);
                return None;
            }
        };

        Some(StationEstimate {
            station_id: id.clone(),
            distance_km: station.distance_km,
            observed_at: current.timestamp,
            frame_time,
            rainfall,
            temperature: finite(current.temperature),
            humidity: finite(current.humidity),
            pm25: finite(current.pm25),
        })
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Fuses each quantity over the stations that report it, weighting by the
/// station's own distance.
pub fn fuse(estimates: &[StationEstimate], config: &ForecastConfig) -> Option<FusedEstimate> {
    let quantity = |pick: fn(&StationEstimate) -> Option<f64>| {
        let samples: Vec<(f64, f64)> = estimates
            .iter()
            .filter_map(|e| pick(e).map(|v| (v, e.distance_km)))
            .collect();
        idw_with(&samples, config.idw_power, config.exact_match_km)
    };

    Some(FusedEstimate {
        rainfall: quantity(|e| Some(e.rainfall))?,
        temperature: quantity(|e| e.temperature),
        humidity: quantity(|e| e.humidity),
        pm25: quantity(|e| e.pm25),
    })
}
