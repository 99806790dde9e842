//! Ground station metadata and its `rstar` spatial index implementations.

use crate::geo::projection::LatLon;
use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

/// A ground sensor station.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Station {
    /// Station identifier as used in the sensor table (e.g. "S50").
    pub id: String,
    /// Hardware identifier, when the registry reports one.
    #[serde(default)]
    pub device_id: Option<String>,
    /// Human readable name (e.g. "Clementi Road").
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Station {
    pub fn new(id: impl Into<String>, name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            device_id: None,
            name: name.into(),
            location: Location {
                latitude,
                longitude,
            },
        }
    }

    pub fn lat_lon(&self) -> LatLon {
        LatLon(self.location.latitude, self.location.longitude)
    }

    /// Planar distance in degrees to `point`.
    pub fn degrees_to(&self, point: LatLon) -> f64 {
        self.distance_2(&[point.latitude(), point.longitude()]).sqrt()
    }
}

/// Stations are points; the envelope is degenerate at `[latitude, longitude]`.
impl RTreeObject for Station {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.location.latitude, self.location.longitude])
    }
}

impl PointDistance for Station {
    /// Squared Euclidean distance in degrees, treating `[lat, lon]` as planar coordinates.
    /// Good enough at city scale.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dlat = self.location.latitude - point[0];
        let dlon = self.location.longitude - point[1];
        dlat * dlat + dlon * dlon
    }
}
