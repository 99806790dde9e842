//! Picks the stations that inform a prediction at an arbitrary point.
//!
//! Stations whose triangle encloses the query are preferred, since interpolating
//! inside a triangle avoids extrapolation. Points outside the mesh (or networks
//! with fewer than three stations) fall back to the nearest stations. Either
//! candidate set is then pruned of distant outliers.

use crate::geo::projection::LatLon;
use crate::stations::mesh::TriangulationCache;
use crate::stations::registry::StationRegistry;
use log::debug;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bon::Builder)]
#[serde(default)]
pub struct SelectorConfig {
    /// Upper bound on the number of contributing stations.
    #[builder(default = 3)]
    pub max_stations: usize,
    /// Flat-earth conversion from planar degrees to kilometres.
    #[builder(default = 111.0)]
    pub km_per_degree: f64,
    /// Candidates beyond this distance are always dropped (closest excepted).
    #[builder(default = 15.0)]
    pub absolute_ceiling_km: f64,
    /// Candidates further than this multiple of the closest distance...
    #[builder(default = 3.0)]
    pub relative_factor: f64,
    /// ...and also further than this are dropped.
    #[builder(default = 3.0)]
    pub relative_floor_km: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingStation {
    pub station_id: String,
    pub distance_km: f64,
}

/// How the candidate set was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionPath {
    Enclosure,
    Nearest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub path: SelectionPath,
    /// Ascending by distance, at most `max_stations` long.
    pub stations: Vec<ContributingStation>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

pub struct StationSelector {
    config: SelectorConfig,
    cache: Arc<TriangulationCache>,
}

impl StationSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self::with_cache(config, Arc::new(TriangulationCache::new()))
    }

    /// Shares an existing mesh cache, e.g. between selectors with different thresholds.
    pub fn with_cache(config: SelectorConfig, cache: Arc<TriangulationCache>) -> Self {
        Self { config, cache }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<TriangulationCache> {
        &self.cache
    }

    pub fn select(&self, registry: &StationRegistry, point: LatLon) -> Selection {
        if registry.is_empty() || self.config.max_stations == 0 {
            return Selection {
                path: SelectionPath::Nearest,
                stations: Vec::new(),
            };
        }

        let enclosing = self
            .cache
            .get_or_build(registry.stations())
            .and_then(|mesh| {
                mesh.enclosing(point).map(|corners| {
                    corners
                        .into_iter()
                        .map(|vertex| ContributingStation {
                            distance_km: self.planar_km(vertex.lat_lon(), point),
                            station_id: vertex.station_id,
                        })
                        .collect::<Vec<_>>()
                })
            });

        let (path, candidates) = match enclosing {
            Some(candidates) => (SelectionPath::Enclosure, candidates),
            None => {
                let candidates = registry
                    .nearest(point, self.config.max_stations)
                    .into_iter()
                    .map(|station| ContributingStation {
                        station_id: station.id.clone(),
                        distance_km: self.planar_km(station.lat_lon(), point),
                    })
                    .collect();
                (SelectionPath::Nearest, candidates)
            }
        };

        let stations = self.prune(candidates);
        debug!(
            "Selected {:?} for ({:.4}, {:.4}) via {:?}",
            stations
                .iter()
                .map(|s| format!("{}@{:.2}km", s.station_id, s.distance_km))
                .collect::<Vec<_>>(),
            point.latitude(),
            point.longitude(),
            path
        );
        Selection { path, stations }
    }

    /// Sorts candidates by distance, drops outliers and truncates to `max_stations`.
    ///
    /// The closest candidate is always kept. Any other is dropped if it is beyond
    /// the absolute ceiling, or if it is both more than `relative_factor` times the
    /// closest distance and beyond the relative floor.
    pub fn prune(&self, mut candidates: Vec<ContributingStation>) -> Vec<ContributingStation> {
        candidates.sort_by_key(|c| OrderedFloat(c.distance_km));
        let Some(closest) = candidates.first().map(|c| c.distance_km) else {
            return candidates;
        };

        let mut kept = Vec::with_capacity(candidates.len());
        for (i, candidate) in candidates.into_iter().enumerate() {
            let d = candidate.distance_km;
            let too_far = d > self.config.absolute_ceiling_km;
            let outlier =
                d > self.config.relative_factor * closest && d > self.config.relative_floor_km;
            if i > 0 && (too_far || outlier) {
                debug!(
                    "Pruned station {} at {:.2} km (closest {:.2} km)",
                    candidate.station_id, d, closest
                );
                continue;
            }
            kept.push(candidate);
        }
        kept.truncate(self.config.max_stations);
        kept
    }

    fn planar_km(&self, a: LatLon, b: LatLon) -> f64 {
        let dlat = a.latitude() - b.latitude();
        let dlon = a.longitude() - b.longitude();
        (dlat * dlat + dlon * dlon).sqrt() * self.config.km_per_degree
    }
}

impl Default for StationSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}
