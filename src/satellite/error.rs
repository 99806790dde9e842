use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Failed to open satellite frame '{0}'")]
    Open(PathBuf, #[source] std::io::Error),

    #[error("Failed to decode satellite frame '{0}'")]
    Decode(PathBuf, #[source] ndarray_npy::ReadNpyError),

    #[error("Failed to encode satellite frame '{0}'")]
    Encode(PathBuf, #[source] ndarray_npy::WriteNpyError),

    #[error("Frame '{path}' has shape {rows}x{cols}, crop box does not fit")]
    CropOutOfBounds {
        path: PathBuf,
        rows: usize,
        cols: usize,
    },

    #[error("Frame '{path}' has unsupported shape {shape:?}")]
    UnexpectedShape { path: PathBuf, shape: Vec<usize> },

    #[error("Frame '{0}' is empty")]
    Empty(PathBuf),

    #[error("Failed to create frame cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cached frame '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to scan frame directory '{0}'")]
    DirectoryScan(PathBuf, #[source] std::io::Error),

    #[error("No decoder registered for raw frame '{0}'")]
    NoDecoder(PathBuf),

    #[cfg(feature = "netcdf")]
    #[error("Failed to read NetCDF frame '{0}'")]
    Netcdf(PathBuf, #[source] netcdf::Error),

    #[error("Frame '{path}' has none of the variables {expected:?}")]
    MissingVariable {
        path: PathBuf,
        expected: &'static [&'static str],
    },
}
