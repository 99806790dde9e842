use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Sensor UTC offset of {0} hours is out of range")]
    InvalidUtcOffset(i32),

    #[error("Invalid alignment parameters: {0}")]
    InvalidParameters(String),

    #[error("Station '{0}' is not present in the sensor store")]
    UnknownStation(String),

    #[error("Sample for station '{station}' references rows beyond the series ({len} rows)")]
    SampleOutOfRange { station: String, len: usize },

    #[error("No satellite frame at {0} for a sample that requires one")]
    FrameUnavailable(chrono::DateTime<chrono::Utc>),

    #[error("Failed to create export directory '{0}'")]
    ExportDirCreation(PathBuf, #[source] std::io::Error),

    #[error("I/O error writing parquet export '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet export '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed building sample manifest: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
