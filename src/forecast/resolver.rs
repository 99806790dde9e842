//! Turns a user query into coordinates.

use crate::forecast::error::ForecastError;
use crate::forecast::geocoder::Geocoder;
use crate::geo::projection::LatLon;
use crate::stations::registry::StationRegistry;
use crate::types::station::Station;
use log::{info, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the caller asked a forecast for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    /// A station id, station name or free-form address.
    Place(String),
    Coordinates(LatLon),
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Query::Place(value.to_string())
    }
}

impl From<String> for Query {
    fn from(value: String) -> Self {
        Query::Place(value)
    }
}

impl From<LatLon> for Query {
    fn from(value: LatLon) -> Self {
        Query::Coordinates(value)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Place(place) => write!(f, "{}", place),
            Query::Coordinates(point) => {
                write!(f, "{:.4}, {:.4}", point.latitude(), point.longitude())
            }
        }
    }
}

/// How a query was resolved, in the order the strategies are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedBy {
    StationId,
    StationName,
    Geocoder,
    Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub point: LatLon,
    pub display_name: String,
    pub resolved_by: ResolvedBy,
    /// Set when the query named a station.
    pub station_id: Option<String>,
}

impl ResolvedLocation {
    fn from_station(station: &Station, resolved_by: ResolvedBy) -> Self {
        Self {
            point: station.lat_lon(),
            display_name: station.name.clone(),
            resolved_by,
            station_id: Some(station.id.clone()),
        }
    }
}

/// Best station whose name is at least `cutoff` similar to `query` (case-insensitive).
/// Ties go to the station listed first.
pub fn match_station_name<'a>(
    registry: &'a StationRegistry,
    query: &str,
    cutoff: f64,
) -> Option<&'a Station> {
    let needle = query.trim().to_lowercase();
    registry
        .stations()
        .iter()
        .map(|station| {
            let score = similarity(&needle, &station.name.to_lowercase());
            (station, score)
        })
        .filter(|(_, score)| *score >= cutoff)
        .fold(None, |best: Option<(&Station, f64)>, (station, score)| match best {
            Some((_, best_score)) if OrderedFloat(best_score) >= OrderedFloat(score) => best,
            _ => Some((station, score)),
        })
        .map(|(station, _)| station)
}

/// Ratcliff/Obershelp similarity: twice the matched characters over the combined length.
///
/// Matches are found by taking the longest common run and recursing on the text to
/// either side of it, so a query that is a prefix of a longer name still scores well.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, len) = longest_common_run(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + len..], &b[j + len..])
}

/// Start in `a`, start in `b` and length of the longest common run. Ties go to the
/// run ending earliest in `a`, then in `b`.
fn longest_common_run(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    // prev[j + 1] is the length of the run ending at the previous char of `a` and b[j].
    let mut prev = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![0usize; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                current[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev = current;
    }
    best
}

/// Resolves `query`: exact station id, then fuzzy station name, then the geocoder.
/// Coordinate queries are used as given and only reverse geocoded for a display name.
///
/// Geocoder failures are logged and treated as "no match".
pub async fn resolve<G: Geocoder>(
    query: &Query,
    registry: &StationRegistry,
    geocoder: &G,
    fuzzy_cutoff: f64,
) -> Result<ResolvedLocation, ForecastError> {
    let place = match query {
        Query::Coordinates(point) => {
            let display_name = match geocoder.reverse(*point).await {
                Ok(Some(name)) => name,
                Ok(None) => query.to_string(),
                Err(e) => {
                    warn!("Reverse geocoding failed for {}: {}", query, e);
                    query.to_string()
                }
            };
            return Ok(ResolvedLocation {
                point: *point,
                display_name,
                resolved_by: ResolvedBy::Coordinates,
                station_id: None,
            });
        }
        Query::Place(place) => place.trim(),
    };

    if place.is_empty() {
        return Err(ForecastError::LocationNotFound(place.to_string()));
    }

    if let Some(station) = registry.get(place) {
        return Ok(ResolvedLocation::from_station(station, ResolvedBy::StationId));
    }

    if let Some(station) = match_station_name(registry, place, fuzzy_cutoff) {
        info!(
            "Location '{}' matched to station '{}' ({})",
            place, station.name, station.id
        );
        return Ok(ResolvedLocation::from_station(station, ResolvedBy::StationName));
    }

    match geocoder.geocode(place).await {
        Ok(Some(point)) => Ok(ResolvedLocation {
            point,
            display_name: place.to_string(),
            resolved_by: ResolvedBy::Geocoder,
            station_id: None,
        }),
        Ok(None) => Err(ForecastError::LocationNotFound(place.to_string())),
        Err(e) => {
            warn!("Geocoding failed for '{}': {}", place, e);
            Err(ForecastError::LocationNotFound(place.to_string()))
        }
    }
}
