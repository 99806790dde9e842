//! Deployment configuration, loadable from a single JSON document.
//!
//! Every section has defaults, so a file only needs the keys it overrides:
//!
//! ```json
//! {
//!   "alignment": { "sensor_utc_offset_hours": 8, "max_history_days": 30 },
//!   "forecast": { "max_radius_km": 10.0, "model_weights": "models/fusion.pt" }
//! }
//! ```

use crate::dataset::alignment::AlignmentConfig;
use crate::forecast::forecaster::ForecastConfig;
use crate::geo::projection::{GeoRegion, GridProjection};
use crate::satellite::frame_index::FrameStoreConfig;
use crate::stations::selector::SelectorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}'")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse config file '{0}'")]
    Parse(PathBuf, #[source] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub grid: GridProjection,
    pub region: GeoRegion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NowcastConfig {
    pub projection: ProjectionConfig,
    pub frames: FrameStoreConfig,
    pub alignment: AlignmentConfig,
    pub selector: SelectorConfig,
    pub forecast: ForecastConfig,
}

impl NowcastConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }
}
