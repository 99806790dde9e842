use crate::config::ConfigError;
use crate::dataset::error::DatasetError;
use crate::forecast::error::ForecastError;
use crate::satellite::error::FrameError;
use crate::sensors::error::SensorDataError;
use crate::stations::error::StationError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NowcastError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    SensorData(#[from] SensorDataError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Station(#[from] StationError),

    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Model weights not found at '{0}'")]
    ModelWeightsMissing(PathBuf),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine cache directory")]
    CacheDirResolution(#[source] std::io::Error),
}
