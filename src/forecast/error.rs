use chrono::NaiveDateTime;
use thiserror::Error;

/// Broad classes of forecast failure, for callers that only need to tell a bad
/// query apart from missing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The query did not resolve to a location.
    NotFound,
    /// The location resolved but there is not enough data around it.
    InsufficientData,
}

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Could not find any location matching '{0}'")]
    LocationNotFound(String),

    #[error("No stations within {radius_km} km of '{location}'")]
    NoStationsInRange { location: String, radius_km: f64 },

    #[error("No station near '{location}' has complete sensor and satellite data at {target}")]
    InsufficientData {
        location: String,
        target: NaiveDateTime,
    },

    #[error("No sensor data loaded")]
    NoSensorData,
}

impl ForecastError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ForecastError::LocationNotFound(_) => FailureKind::NotFound,
            ForecastError::NoStationsInRange { .. }
            | ForecastError::InsufficientData { .. }
            | ForecastError::NoSensorData => FailureKind::InsufficientData,
        }
    }
}
