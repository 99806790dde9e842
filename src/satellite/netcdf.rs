//! Decoder for the provider's NetCDF brightness-temperature files.

use crate::satellite::error::FrameError;
use crate::satellite::frame_index::RawFrameDecoder;
use ndarray::Array2;
use std::path::Path;

/// Candidate variables, most specific first.
pub const BRIGHTNESS_VARIABLES: &[&str] = &["tbb_13", "tbb"];

/// Reads the band-13 brightness temperature from `.nc` frames.
///
/// `scale_factor` and `add_offset` are applied when present and `_FillValue`
/// cells become NaN.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetcdfFrameDecoder;

impl RawFrameDecoder for NetcdfFrameDecoder {
    fn extension(&self) -> &str {
        "nc"
    }

    fn decode(&self, path: &Path) -> Result<Array2<f32>, FrameError> {
        let netcdf_err = |e| FrameError::Netcdf(path.to_path_buf(), e);
        let file = netcdf::open(path).map_err(netcdf_err)?;

        let var = BRIGHTNESS_VARIABLES
            .iter()
            .find_map(|name| file.variable(name))
            .ok_or_else(|| FrameError::MissingVariable {
                path: path.to_path_buf(),
                expected: BRIGHTNESS_VARIABLES,
            })?;

        let full_shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        // Drop leading unit axes such as a single time step.
        let mut shape = full_shape.as_slice();
        while shape.len() > 2 && shape[0] == 1 {
            shape = &shape[1..];
        }
        let &[rows, cols] = shape else {
            return Err(FrameError::UnexpectedShape {
                path: path.to_path_buf(),
                shape: full_shape.clone(),
            });
        };

        let raw: Vec<f32> = var.get_values(..).map_err(netcdf_err)?;
        let scale_factor = get_f32_attr(&var, "scale_factor").unwrap_or(1.0);
        let add_offset = get_f32_attr(&var, "add_offset").unwrap_or(0.0);
        let fill_value = get_f32_attr(&var, "_FillValue");

        let kelvin: Vec<f32> = raw
            .into_iter()
            .map(|v| match fill_value {
                Some(fill) if v == fill => f32::NAN,
                _ => v * scale_factor + add_offset,
            })
            .collect();

        Array2::from_shape_vec((rows, cols), kelvin).map_err(|_| FrameError::UnexpectedShape {
            path: path.to_path_buf(),
            shape: full_shape,
        })
    }
}

fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn get_f32_attr(var: &netcdf::Variable, name: &str) -> Option<f32> {
    if !has_attr(var, name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f32::try_from(value).ok()
}
