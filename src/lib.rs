mod config;
mod dataset;
mod error;
mod forecast;
mod geo;
mod interpolation;
mod nowcast;
mod satellite;
mod sensors;
mod stations;
mod types;
mod utils;

pub use config::{ConfigError, NowcastConfig, ProjectionConfig};
pub use error::NowcastError;
pub use nowcast::*;

pub use geo::projection::*;

pub use satellite::error::FrameError;
pub use satellite::frame_index::{
    default_decoders, frame_key, parse_frame_timestamp, FrameSource, FrameStoreConfig,
    NpyFrameDecoder, RawFrameDecoder, SatelliteFrame, SatelliteFrameIndex, KELVIN_OFFSET,
    KELVIN_SCALE,
};
#[cfg(feature = "netcdf")]
pub use satellite::netcdf::{NetcdfFrameDecoder, BRIGHTNESS_VARIABLES};
pub use satellite::preprocess::PreprocessReport;
pub use satellite::resize::{crop, resize_bilinear};

pub use sensors::error::SensorDataError;
pub use sensors::reader::{parse_timestamp, retain_recent, SensorReader};
pub use sensors::resample::SensorSeriesResampler;
pub use sensors::store::SensorStore;
pub use types::sensor::*;
pub use types::station::*;

pub use dataset::aligner::{FrameAvailability, TemporalAligner, TrainingSample};
pub use dataset::alignment::{AlignmentConfig, TimeAlignment};
pub use dataset::corpus::{MaterializedSample, TrainingCorpus};
pub use dataset::error::DatasetError;
pub use dataset::features::{sensor_features, ModelInput, SENSOR_FEATURES};

pub use stations::error::StationError;
pub use stations::mesh::{StationMesh, StationVertex, TriangulationCache};
pub use stations::registry::StationRegistry;
pub use stations::selector::{
    ContributingStation, Selection, SelectionPath, SelectorConfig, StationSelector,
};

pub use interpolation::idw::{idw, idw_with};

pub use forecast::error::{FailureKind, ForecastError};
pub use forecast::forecaster::{
    fuse, Forecast, ForecastConfig, FusedEstimate, StationEstimate, StationForecaster,
};
pub use forecast::geocoder::{GeocodeError, Geocoder, NoGeocoder, NominatimGeocoder};
pub use forecast::model::{ModelError, RainfallModel};
pub use forecast::outlook::WeatherOutlook;
pub use forecast::resolver::{match_station_name, resolve, Query, ResolvedBy, ResolvedLocation};
