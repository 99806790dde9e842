//! Model input construction shared by training and serving.
//!
//! Both paths must scale identically; the constants below are the only copy.

use crate::satellite::frame_index::SatelliteFrame;
use crate::types::sensor::ResampledRow;
use ndarray::Array2;

/// Column order of the sensor feature matrix.
pub const SENSOR_FEATURES: [&str; 4] = ["temperature", "rainfall", "humidity", "pm25"];

pub const TEMPERATURE_CENTER: f32 = 28.0;
pub const TEMPERATURE_SCALE: f32 = 5.0;
pub const RAINFALL_SCALE: f32 = 10.0;
pub const HUMIDITY_CENTER: f32 = 80.0;
pub const HUMIDITY_SCALE: f32 = 20.0;
pub const PM25_CENTER: f32 = 20.0;
pub const PM25_SCALE: f32 = 20.0;

/// The two inputs of the rainfall model for one station and one time step.
#[derive(Debug, Clone)]
pub struct ModelInput {
    /// Normalised satellite crop, `output_size x output_size`.
    pub satellite: Array2<f32>,
    /// Normalised sensor window, `seq_len x 4` in [`SENSOR_FEATURES`] order.
    pub sensor: Array2<f32>,
}

impl ModelInput {
    pub fn new(frame: &SatelliteFrame, window: &[ResampledRow]) -> Self {
        Self {
            satellite: frame.normalized(),
            sensor: sensor_features(window),
        }
    }
}

pub fn sensor_features(window: &[ResampledRow]) -> Array2<f32> {
    let mut features = Array2::zeros((window.len(), SENSOR_FEATURES.len()));
    for (mut out, row) in features.outer_iter_mut().zip(window) {
        out[0] = (row.temperature as f32 - TEMPERATURE_CENTER) / TEMPERATURE_SCALE;
        out[1] = row.rainfall as f32 / RAINFALL_SCALE;
        out[2] = (row.humidity as f32 - HUMIDITY_CENTER) / HUMIDITY_SCALE;
        out[3] = (row.pm25 as f32 - PM25_CENTER) / PM25_SCALE;
    }
    features
}
