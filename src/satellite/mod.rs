pub mod error;
pub mod frame_index;
#[cfg(feature = "netcdf")]
pub mod netcdf;
pub mod preprocess;
pub mod resize;
