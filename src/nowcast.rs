//! The main entry point: a client that answers rainfall forecast queries for
//! arbitrary places, and exposes the training corpus built from the same data.

use crate::config::NowcastConfig;
use crate::dataset::aligner::TemporalAligner;
use crate::dataset::alignment::TimeAlignment;
use crate::dataset::corpus::TrainingCorpus;
use crate::dataset::error::DatasetError;
use crate::error::NowcastError;
use crate::forecast::error::ForecastError;
use crate::forecast::forecaster::{fuse, Forecast, ForecastConfig, StationEstimate, StationForecaster};
use crate::forecast::geocoder::Geocoder;
use crate::forecast::model::RainfallModel;
use crate::forecast::resolver::{resolve, Query};
use crate::satellite::frame_index::SatelliteFrameIndex;
use crate::satellite::preprocess::PreprocessReport;
use crate::sensors::error::SensorDataError;
use crate::sensors::reader::SensorReader;
use crate::sensors::resample::SensorSeriesResampler;
use crate::sensors::store::SensorStore;
use crate::stations::registry::StationRegistry;
use crate::stations::selector::StationSelector;
use crate::utils::{ensure_cache_dir_exists, get_cache_dir};
use bon::bon;
use chrono::NaiveDateTime;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;

/// Forecast client.
///
/// Holds a read-only snapshot of the station registry, the resampled sensor
/// history and the satellite frame index, plus the trained model and a geocoder.
///
/// # Examples
///
/// ```rust,no_run
/// # use nowcast::{Nowcast, NominatimGeocoder, NowcastError, RainfallModel, ModelError};
/// # use ndarray::ArrayView2;
/// # use std::sync::Arc;
/// # struct MyModel;
/// # impl RainfallModel for MyModel {
/// #     fn predict(&self, _: ArrayView2<f32>, _: ArrayView2<f32>) -> Result<f32, ModelError> { Ok(0.0) }
/// # }
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Nowcast::load()
///     .sensor_csv("data/sensor_data.csv")
///     .model(Arc::new(MyModel))
///     .geocoder(NominatimGeocoder::builder().region_suffix("Singapore").build()?)
///     .call()
///     .await?;
///
/// let forecast = client.forecast("Clementi").await?;
/// println!("{}: {:.2} mm ({})", forecast.location.display_name, forecast.rainfall_mm, forecast.outlook);
/// # Ok(())
/// # }
/// ```
pub struct Nowcast<G: Geocoder> {
    config: NowcastConfig,
    registry: StationRegistry,
    sensors: SensorStore,
    frames: SatelliteFrameIndex,
    selector: StationSelector,
    alignment: TimeAlignment,
    model: Arc<dyn RainfallModel>,
    geocoder: G,
}

fn check_model_weights(config: &ForecastConfig) -> Result<(), NowcastError> {
    match &config.model_weights {
        Some(path) if !path.exists() => Err(NowcastError::ModelWeightsMissing(path.clone())),
        _ => Ok(()),
    }
}

#[bon]
impl<G: Geocoder> Nowcast<G> {
    /// Assembles a client from already-loaded parts.
    ///
    /// When `frames` is not given the directories in `config.frames` are scanned.
    ///
    /// # Errors
    ///
    /// Returns [`NowcastError::ModelWeightsMissing`] when `config.forecast.model_weights`
    /// is set but does not exist, and [`NowcastError::Dataset`] for an invalid
    /// alignment configuration.
    #[builder]
    pub fn new(
        #[builder(default)] config: NowcastConfig,
        registry: StationRegistry,
        sensors: SensorStore,
        frames: Option<SatelliteFrameIndex>,
        model: Arc<dyn RainfallModel>,
        geocoder: G,
    ) -> Result<Self, NowcastError> {
        check_model_weights(&config.forecast)?;
        let alignment = TimeAlignment::new(&config.alignment)?;
        let frames = frames.unwrap_or_else(|| {
            SatelliteFrameIndex::scan(
                config.frames.clone(),
                &config.projection.grid,
                &config.projection.region,
            )
        });
        if sensors.is_empty() {
            warn!("Nowcast client created without sensor data; every forecast will fail");
        }
        Ok(Self {
            selector: StationSelector::new(config.selector.clone()),
            config,
            registry,
            sensors,
            frames,
            alignment,
            model,
            geocoder,
        })
    }

    /// Loads everything from disk (and the network, for an uncached station registry).
    ///
    /// * `.sensor_csv(path)`: **Required.** The raw sensor table.
    /// * `.station_snapshot(path)`: Optional JSON station list. Without it the registry is
    ///   read from the bincode cache in `cache_folder`, fetching it on first use.
    /// * `.cache_folder(path)`: Optional. Defaults to the system cache directory.
    #[builder]
    pub async fn load(
        #[builder(default)] config: NowcastConfig,
        #[builder(into)] sensor_csv: PathBuf,
        #[builder(into)] station_snapshot: Option<PathBuf>,
        #[builder(into)] cache_folder: Option<PathBuf>,
        model: Arc<dyn RainfallModel>,
        geocoder: G,
    ) -> Result<Self, NowcastError> {
        // Fail before any slow loading.
        check_model_weights(&config.forecast)?;

        let registry = match station_snapshot {
            Some(path) => StationRegistry::from_json_file(&path)?,
            None => {
                let cache_folder = match cache_folder {
                    Some(folder) => folder,
                    None => get_cache_dir().map_err(NowcastError::CacheDirResolution)?,
                };
                ensure_cache_dir_exists(&cache_folder)
                    .await
                    .map_err(|e| NowcastError::CacheDirCreation(cache_folder.clone(), e))?;
                StationRegistry::load(&cache_folder).await?
            }
        };

        let reader = SensorReader::new(config.alignment.sensor_offset()?);
        let resampler = SensorSeriesResampler::new(config.alignment.bucket())?;
        let history_days = config.alignment.max_history_days;
        let sensors = tokio::task::spawn_blocking(move || {
            SensorStore::load_csv(&sensor_csv, &reader, &resampler, history_days)
        })
        .await
        .map_err(SensorDataError::from)??;

        info!(
            "Loaded {} stations and sensor history for {} of them",
            registry.len(),
            sensors.len()
        );

        Self::builder()
            .config(config)
            .registry(registry)
            .sensors(sensors)
            .model(model)
            .geocoder(geocoder)
            .build()
    }
}

impl<G: Geocoder> Nowcast<G> {
    pub fn config(&self) -> &NowcastConfig {
        &self.config
    }

    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    pub fn sensors(&self) -> &SensorStore {
        &self.sensors
    }

    pub fn frames(&self) -> &SatelliteFrameIndex {
        &self.frames
    }

    pub fn selector(&self) -> &StationSelector {
        &self.selector
    }

    pub fn alignment(&self) -> &TimeAlignment {
        &self.alignment
    }

    /// Forecast for `query` at the newest sensor bucket.
    pub async fn forecast(&self, query: impl Into<Query>) -> Result<Forecast, ForecastError> {
        self.forecast_at(query, None).await
    }

    /// Forecast for `query` at `target` (sensor-local time), or the newest sensor bucket.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::LocationNotFound`] when the query cannot be resolved.
    /// * [`ForecastError::NoStationsInRange`] when no selected station lies within
    ///   `max_radius_km`.
    /// * [`ForecastError::InsufficientData`] when none of those stations has a full
    ///   sensor window and a satellite frame.
    pub async fn forecast_at(
        &self,
        query: impl Into<Query>,
        target: Option<NaiveDateTime>,
    ) -> Result<Forecast, ForecastError> {
        let query = query.into();
        let location = resolve(
            &query,
            &self.registry,
            &self.geocoder,
            self.config.forecast.fuzzy_cutoff,
        )
        .await?;

        let selection = self.selector.select(&self.registry, location.point);
        let radius_km = self.config.forecast.max_radius_km;
        let in_range: Vec<_> = selection
            .stations
            .into_iter()
            .filter(|s| s.distance_km <= radius_km)
            .collect();
        if in_range.is_empty() {
            return Err(ForecastError::NoStationsInRange {
                location: location.display_name,
                radius_km,
            });
        }

        let target = target
            .or_else(|| self.sensors.latest_timestamp())
            .ok_or(ForecastError::NoSensorData)?;

        let forecaster = StationForecaster {
            sensors: &self.sensors,
            frames: &self.frames,
            model: self.model.as_ref(),
            alignment: self.alignment,
            seq_len: self.config.alignment.seq_len,
        };
        let estimates: Vec<StationEstimate> = in_range
            .iter()
            .filter_map(|station| forecaster.estimate(station, target))
            .collect();

        let Some(fused) = fuse(&estimates, &self.config.forecast) else {
            return Err(ForecastError::InsufficientData {
                location: location.display_name,
                target,
            });
        };

        let forecast = Forecast::new(location, target, selection.path, estimates, fused);
        info!(
            "Forecast for '{}' at {}: {:.3} mm ({}) from {:?}",
            forecast.location.display_name,
            target,
            forecast.rainfall_mm,
            forecast.outlook,
            forecast.station_ids()
        );
        Ok(forecast)
    }

    /// Runs several queries one after another. A failing query does not stop the others.
    pub async fn forecast_many<Q: Into<Query>>(
        &self,
        queries: impl IntoIterator<Item = Q>,
    ) -> Vec<(Query, Result<Forecast, ForecastError>)> {
        let mut results = Vec::new();
        for query in queries {
            let query = query.into();
            let result = self.forecast_at(query.clone(), None).await;
            if let Err(e) = &result {
                warn!("Forecast for '{}' failed: {}", query, e);
            }
            results.push((query, result));
        }
        results
    }

    /// The training corpus over this client's sensor history and satellite frames.
    pub fn training_corpus(&self) -> Result<TrainingCorpus<'_>, DatasetError> {
        let aligner = TemporalAligner::new(&self.config.alignment)?;
        Ok(TrainingCorpus::build(&self.sensors, &self.frames, &aligner))
    }

    /// Caches every raw satellite frame as a cropped, resized frame.
    pub fn preprocess_frames(&mut self) -> Result<PreprocessReport, NowcastError> {
        Ok(self.frames.preprocess_raw_frames()?)
    }
}
