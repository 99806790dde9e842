use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorDataError {
    #[error("Failed to read sensor CSV '{path}'")]
    CsvRead {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("Missing required column '{column}' in sensor data from '{source_name}'")]
    MissingColumn {
        source_name: String,
        column: String,
    },

    #[error("Failed processing sensor DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Invalid resampling interval of {0} seconds")]
    InvalidInterval(i64),

    #[error("Sensor data from '{0}' contains no usable rows")]
    NoUsableRows(String),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
