use crate::geo::projection::LatLon;
use crate::stations::error::StationError;
use crate::types::station::Station;
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::{info, warn};
use reqwest::Client;
use rstar::RTree;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DATA_URL: &str = "https://api.data.gov.sg/v1/environment/rainfall";
const BINCODE_CACHE_FILE_NAME: &str = "rainfall_stations.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Shape of the rainfall endpoint; only the station metadata is used.
#[derive(Debug, Deserialize)]
struct RainfallResponse {
    metadata: RainfallMetadata,
}

#[derive(Debug, Deserialize)]
struct RainfallMetadata {
    stations: Vec<Station>,
}

/// Either a bare station list or a saved endpoint response.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Stations(Vec<Station>),
    Response(RainfallResponse),
}

/// Read-only snapshot of the station network.
#[derive(Debug, Clone)]
pub struct StationRegistry {
    stations: Vec<Station>,
    by_id: HashMap<String, usize>,
    rtree: RTree<Station>,
}

impl StationRegistry {
    /// Builds a registry, keeping the first station for each duplicated id.
    pub fn from_stations(stations: Vec<Station>) -> Self {
        let mut unique = Vec::with_capacity(stations.len());
        let mut by_id = HashMap::with_capacity(stations.len());
        for station in stations {
            if by_id.contains_key(&station.id) {
                warn!("Duplicate station id '{}' in registry, keeping first", station.id);
                continue;
            }
            by_id.insert(station.id.clone(), unique.len());
            unique.push(station);
        }
        let rtree = RTree::bulk_load(unique.clone());
        Self {
            stations: unique,
            by_id,
            rtree,
        }
    }

    /// Loads the registry from the bincode cache in `cache_dir`, fetching and caching it when absent.
    pub async fn load(cache_dir: &Path) -> Result<Self, StationError> {
        let cache_file = cache_dir.join(BINCODE_CACHE_FILE_NAME);
        let stations = if cache_file.exists() {
            let path_clone = cache_file.clone();
            tokio::task::spawn_blocking(move || Self::get_cached_stations(&path_clone)).await??
        } else {
            info!("Station cache not found. Fetching from URL: {}", DATA_URL);
            let stations = Self::fetch_stations(DATA_URL).await?;
            tokio::fs::create_dir_all(cache_dir)
                .await
                .map_err(|e| StationError::CacheDirCreation(cache_dir.to_path_buf(), e))?;
            Self::cache_stations(stations.clone(), &cache_file).await?;
            stations
        };
        info!("Station registry holds {} stations", stations.len());
        Ok(Self::from_stations(stations))
    }

    /// Fetches the current station list without touching the cache.
    pub async fn fetch(url: &str) -> Result<Self, StationError> {
        Ok(Self::from_stations(Self::fetch_stations(url).await?))
    }

    /// Loads a JSON snapshot: either a list of stations or a saved endpoint response.
    pub fn from_json_file(path: &Path) -> Result<Self, StationError> {
        let bytes =
            std::fs::read(path).map_err(|e| StationError::SnapshotRead(path.to_path_buf(), e))?;
        Self::from_json_slice(&bytes)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, StationError> {
        let stations = match serde_json::from_slice::<Snapshot>(bytes)? {
            Snapshot::Stations(stations) => stations,
            Snapshot::Response(response) => response.metadata.stations,
        };
        Ok(Self::from_stations(stations))
    }

    fn get_cached_stations(cache_path: &Path) -> Result<Vec<Station>, StationError> {
        let bytes = std::fs::read(cache_path)
            .map_err(|e| StationError::CacheRead(cache_path.to_path_buf(), e))?;
        let (decoded, _) = bincode::serde::decode_from_slice::<Vec<Station>, _>(&bytes, BINCODE_CONFIG)
            .map_err(|e| StationError::CacheDecode(cache_path.to_path_buf(), Box::new(e)))?;
        Ok(decoded)
    }

    async fn fetch_stations(url: &str) -> Result<Vec<Station>, StationError> {
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(StationError::ClientBuild)?;
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| StationError::NetworkRequest(url.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(match e.status() {
                    Some(status) => StationError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    },
                    None => StationError::NetworkRequest(url.to_string(), e),
                });
            }
        };
        let body = response
            .bytes()
            .await
            .map_err(|e| StationError::NetworkRequest(url.to_string(), e))?;
        let parsed: RainfallResponse = serde_json::from_slice(&body)?;
        let stations = parsed.metadata.stations;
        if stations.is_empty() {
            return Err(StationError::EmptyRegistry);
        }
        info!("Fetched metadata for {} rainfall stations", stations.len());
        Ok(stations)
    }

    async fn cache_stations(stations: Vec<Station>, cache_path: &Path) -> Result<(), StationError> {
        let bincode_data = tokio::task::spawn_blocking(move || {
            bincode::serde::encode_to_vec(stations, BINCODE_CONFIG)
                .map_err(|e| StationError::CacheEncode(Box::new(e)))
        })
        .await??;
        tokio::fs::write(cache_path, &bincode_data)
            .await
            .map_err(|e| StationError::CacheWrite(cache_path.to_path_buf(), e))?;
        info!(
            "Wrote station cache ({} bytes) to {}",
            bincode_data.len(),
            cache_path.display()
        );
        Ok(())
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn get(&self, id: &str) -> Option<&Station> {
        self.by_id.get(id).map(|&i| &self.stations[i])
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Up to `n` stations by ascending planar distance from `point`.
    pub fn nearest(&self, point: LatLon, n: usize) -> Vec<&Station> {
        self.rtree
            .nearest_neighbor_iter(&[point.latitude(), point.longitude()])
            .take(n)
            .collect()
    }
}
