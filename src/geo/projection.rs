//! Equirectangular (EQR) grid math for the gridded satellite product.
//!
//! The product is a regular latitude/longitude grid whose origin (row 0, col 0)
//! is the top-left corner `(lat_max, lon_min)`. Rows grow southwards and columns
//! grow eastwards, so the mapping is linear in both axes.

use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use nowcast::LatLon;
///
/// let clementi = LatLon(1.3337, 103.7768);
/// assert_eq!(clementi.latitude(), 1.3337);
/// assert_eq!(clementi.longitude(), 103.7768);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub fn latitude(&self) -> f64 {
        self.0
    }

    pub fn longitude(&self) -> f64 {
        self.1
    }
}

/// A pixel position on the projection grid. Values may fall outside the physical
/// extent of a frame; callers validate bounds against the array they index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelIndex {
    pub col: i64,
    pub row: i64,
}

/// A half-open pixel rectangle `[row_min, row_max) x [col_min, col_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    pub col_min: i64,
    pub col_max: i64,
    pub row_min: i64,
    pub row_max: i64,
}

impl CropBox {
    pub fn width(&self) -> usize {
        (self.col_max - self.col_min).max(0) as usize
    }

    pub fn height(&self) -> usize {
        (self.row_max - self.row_min).max(0) as usize
    }

    /// Whether the box is non-empty and lies entirely inside an array of `rows x cols`.
    pub fn fits_within(&self, rows: usize, cols: usize) -> bool {
        self.width() > 0
            && self.height() > 0
            && self.row_min >= 0
            && self.col_min >= 0
            && self.row_max as usize <= rows
            && self.col_max as usize <= cols
    }
}

/// A geographic bounding box for the region of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bon::Builder)]
pub struct GeoRegion {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeoRegion {
    /// Singapore, approximately.
    pub const SINGAPORE: GeoRegion = GeoRegion {
        lat_min: 1.15,
        lat_max: 1.50,
        lon_min: 103.6,
        lon_max: 104.1,
    };
}

impl Default for GeoRegion {
    fn default() -> Self {
        Self::SINGAPORE
    }
}

/// Immutable EQR projection constants.
///
/// Defaults describe the JAXA Himawari L3 gridded product: origin at 60N 70E,
/// 0.02 degrees per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct GridProjection {
    #[builder(default = 60.0)]
    pub lat_max: f64,
    #[builder(default = 70.0)]
    pub lon_min: f64,
    /// Degrees per pixel, identical in both axes.
    #[builder(default = 0.02)]
    pub resolution: f64,
}

impl Default for GridProjection {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GridProjection {
    /// Maps a geographic coordinate to its nearest pixel.
    ///
    /// Rounding is half-to-even so that crop boxes agree bit-for-bit with frames
    /// that were cropped by the existing preprocessing tooling.
    pub fn project(&self, point: LatLon) -> PixelIndex {
        let row = (self.lat_max - point.latitude()) / self.resolution;
        let col = (point.longitude() - self.lon_min) / self.resolution;
        PixelIndex {
            col: col.round_ties_even() as i64,
            row: row.round_ties_even() as i64,
        }
    }

    /// Inverse of [`GridProjection::project`], returning the pixel centre.
    pub fn pixel_to_latlon(&self, pixel: PixelIndex) -> LatLon {
        LatLon(
            self.lat_max - pixel.row as f64 * self.resolution,
            self.lon_min + pixel.col as f64 * self.resolution,
        )
    }

    /// Pixel rectangle covering `region`.
    ///
    /// Corner ordering depends on hemisphere sign conventions, so min/max are taken
    /// per axis rather than assuming which corner is top-left.
    pub fn crop_box(&self, region: &GeoRegion) -> CropBox {
        let a = self.project(LatLon(region.lat_max, region.lon_min));
        let b = self.project(LatLon(region.lat_min, region.lon_max));
        CropBox {
            col_min: a.col.min(b.col),
            col_max: a.col.max(b.col),
            row_min: a.row.min(b.row),
            row_max: a.row.max(b.row),
        }
    }
}
