//! Cropping and bilinear resizing of gridded frames.

use crate::geo::projection::CropBox;
use ndarray::{s, Array2, ArrayView2};

/// Cuts `crop` out of `frame`. The caller must have checked [`CropBox::fits_within`].
pub fn crop(frame: ArrayView2<'_, f32>, crop: &CropBox) -> Array2<f32> {
    frame
        .slice(s![
            crop.row_min as usize..crop.row_max as usize,
            crop.col_min as usize..crop.col_max as usize
        ])
        .to_owned()
}

/// Bilinear resize with half-pixel centres (`align_corners = false`), matching the
/// resampling used when the training cache was produced.
pub fn resize_bilinear(src: ArrayView2<'_, f32>, out_rows: usize, out_cols: usize) -> Array2<f32> {
    let (in_rows, in_cols) = src.dim();
    let mut out = Array2::zeros((out_rows, out_cols));
    if in_rows == 0 || in_cols == 0 {
        return out;
    }

    let row_scale = in_rows as f64 / out_rows as f64;
    let col_scale = in_cols as f64 / out_cols as f64;

    for i in 0..out_rows {
        let (y0, y1, dy) = source_coordinate(i, row_scale, in_rows);
        for j in 0..out_cols {
            let (x0, x1, dx) = source_coordinate(j, col_scale, in_cols);

            let v00 = src[[y0, x0]] as f64;
            let v01 = src[[y0, x1]] as f64;
            let v10 = src[[y1, x0]] as f64;
            let v11 = src[[y1, x1]] as f64;

            let top = v00 * (1.0 - dx) + v01 * dx;
            let bottom = v10 * (1.0 - dx) + v11 * dx;
            out[[i, j]] = (top * (1.0 - dy) + bottom * dy) as f32;
        }
    }
    out
}

/// Returns the two neighbouring source indices and the interpolation weight of the
/// second one for output index `dst`.
fn source_coordinate(dst: usize, scale: f64, len: usize) -> (usize, usize, f64) {
    let src = ((dst as f64 + 0.5) * scale - 0.5).max(0.0);
    let lo = (src.floor() as usize).min(len - 1);
    let hi = (lo + 1).min(len - 1);
    let weight = if hi == lo { 0.0 } else { src - lo as f64 };
    (lo, hi, weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_crop_takes_half_open_window() {
        let frame = Array2::from_shape_fn((5, 6), |(r, c)| (r * 10 + c) as f32);
        let crop_box = CropBox {
            col_min: 1,
            col_max: 4,
            row_min: 2,
            row_max: 4,
        };
        let out = crop(frame.view(), &crop_box);
        assert_eq!(out.dim(), (2, 3));
        assert_eq!(out[[0, 0]], 21.0);
        assert_eq!(out[[1, 2]], 33.0);
    }

    #[test]
    fn test_resize_constant_is_constant() {
        let frame = Array2::from_elem((17, 25), 287.5f32);
        let out = resize_bilinear(frame.view(), 64, 64);
        assert_eq!(out.dim(), (64, 64));
        for v in out.iter() {
            assert_relative_eq!(*v, 287.5, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_resize_identity_size_is_identity() {
        let frame = array![[1.0f32, 2.0], [3.0, 4.0]];
        let out = resize_bilinear(frame.view(), 2, 2);
        assert_eq!(out, frame);
    }

    #[test]
    fn test_upsample_matches_half_pixel_convention() {
        // 1x2 -> 1x4 with align_corners=false gives [a, 0.75a+0.25b, 0.25a+0.75b, b].
        let frame = array![[0.0f32, 4.0]];
        let out = resize_bilinear(frame.view(), 1, 4);
        assert_relative_eq!(out[[0, 0]], 0.0);
        assert_relative_eq!(out[[0, 1]], 1.0);
        assert_relative_eq!(out[[0, 2]], 3.0);
        assert_relative_eq!(out[[0, 3]], 4.0);
    }
}
