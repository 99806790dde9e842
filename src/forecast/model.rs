use ndarray::ArrayView2;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Model inference failed: {0}")]
pub struct ModelError(pub String);

/// A trained rainfall regressor.
///
/// `satellite` is the normalised `output_size x output_size` crop; `sensor` is the
/// normalised `seq_len x 4` window (temperature, rainfall, humidity, pm25). The
/// output is predicted rainfall in millimetres for the next bucket.
pub trait RainfallModel: Send + Sync {
    fn predict(&self, satellite: ArrayView2<f32>, sensor: ArrayView2<f32>)
        -> Result<f32, ModelError>;
}

impl<F> RainfallModel for F
where
    F: Fn(ArrayView2<f32>, ArrayView2<f32>) -> Result<f32, ModelError> + Send + Sync,
{
    fn predict(
        &self,
        satellite: ArrayView2<f32>,
        sensor: ArrayView2<f32>,
    ) -> Result<f32, ModelError> {
        self(satellite, sensor)
    }
}
