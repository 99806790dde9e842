//! The training corpus: aligned sample descriptors plus lazy tensor construction.

use crate::dataset::aligner::{TemporalAligner, TrainingSample};
use crate::dataset::error::DatasetError;
use crate::dataset::features::ModelInput;
use crate::satellite::frame_index::SatelliteFrameIndex;
use crate::sensors::store::SensorStore;
use log::{info, warn};
use polars::prelude::*;
use std::path::Path;

/// One sample's model inputs and its target rainfall in millimetres.
#[derive(Debug, Clone)]
pub struct MaterializedSample {
    pub input: ModelInput,
    pub target: f32,
}

pub struct TrainingCorpus<'a> {
    store: &'a SensorStore,
    frames: &'a SatelliteFrameIndex,
    samples: Vec<TrainingSample>,
}

impl<'a> TrainingCorpus<'a> {
    pub fn build(
        store: &'a SensorStore,
        frames: &'a SatelliteFrameIndex,
        aligner: &TemporalAligner,
    ) -> Self {
        let samples = aligner.align(store, frames);
        Self {
            store,
            frames,
            samples,
        }
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Loads the frame and sensor window for sample `index`.
    ///
    /// Fails if the frame, although indexed, cannot be read.
    pub fn materialize(&self, index: usize) -> Result<MaterializedSample, DatasetError> {
        let sample = self.samples.get(index).ok_or_else(|| {
            DatasetError::InvalidParameters(format!(
                "sample index {} out of range ({} samples)",
                index,
                self.samples.len()
            ))
        })?;
        let series = self
            .store
            .get(&sample.station_id)
            .ok_or_else(|| DatasetError::UnknownStation(sample.station_id.clone()))?;
        let (Some(window), Some(target)) = (
            series.rows.get(sample.window.clone()),
            series.rows.get(sample.target_index),
        ) else {
            return Err(DatasetError::SampleOutOfRange {
                station: sample.station_id.clone(),
                len: series.len(),
            });
        };
        let frame = self
            .frames
            .load(sample.window_end)
            .ok_or(DatasetError::FrameUnavailable(sample.window_end))?;

        Ok(MaterializedSample {
            input: ModelInput::new(&frame, window),
            target: target.rainfall as f32,
        })
    }

    /// Materialises every sample, skipping (and logging) those whose frame fails to load.
    pub fn iter_materialized(&self) -> impl Iterator<Item = MaterializedSample> + '_ {
        (0..self.samples.len()).filter_map(move |i| match self.materialize(i) {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!("Skipping training sample {}: {}", i, e);
                None
            }
        })
    }

    /// One row per sample: station, window bounds, frame time and target.
    pub fn manifest(&self) -> Result<DataFrame, DatasetError> {
        let mut station_id = Vec::with_capacity(self.samples.len());
        let mut window_start = Vec::with_capacity(self.samples.len());
        let mut window_end_utc = Vec::with_capacity(self.samples.len());
        let mut target_time = Vec::with_capacity(self.samples.len());
        let mut target_rainfall = Vec::with_capacity(self.samples.len());

        for sample in &self.samples {
            let Some(series) = self.store.get(&sample.station_id) else {
                continue;
            };
            let (Some(first), Some(target)) = (
                series.rows.get(sample.window.start),
                series.rows.get(sample.target_index),
            ) else {
                continue;
            };
            station_id.push(sample.station_id.as_str());
            window_start.push(first.timestamp.and_utc().timestamp_millis());
            window_end_utc.push(sample.window_end.timestamp_millis());
            target_time.push(target.timestamp.and_utc().timestamp_millis());
            target_rainfall.push(target.rainfall);
        }

        let datetime = DataType::Datetime(TimeUnit::Milliseconds, None);
        let df = df!(
            "station_id" => station_id,
            "window_start" => window_start,
            "window_end_utc" => window_end_utc,
            "target_time" => target_time,
            "target_rainfall" => target_rainfall,
        )?
        .lazy()
        .with_columns([
            col("window_start").cast(datetime.clone()),
            col("window_end_utc").cast(datetime.clone()),
            col("target_time").cast(datetime),
        ])
        .collect()?;
        Ok(df)
    }

    /// Writes [`TrainingCorpus::manifest`] to a Snappy-compressed Parquet file.
    pub fn export_parquet(&self, path: &Path) -> Result<(), DatasetError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| DatasetError::ExportDirCreation(parent.to_path_buf(), e))?;
        }
        let mut df = self.manifest()?;
        let file = std::fs::File::create(path)
            .map_err(|e| DatasetError::ParquetWriteIo(path.to_path_buf(), e))?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df)
            .map_err(|e| DatasetError::ParquetWritePolars(path.to_path_buf(), e))?;
        info!(
            "Exported manifest of {} samples to {}",
            df.height(),
            path.display()
        );
        Ok(())
    }
}
