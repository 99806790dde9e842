use crate::geo::projection::LatLon;
use bon::bon;
use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
const USER_AGENT: &str = "SingaporeWeatherAI/1.0";
const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Geocoding request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("Geocoding request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Geocoder returned an unparseable coordinate '{0}'")]
    InvalidCoordinate(String),
}

/// Address lookup against an external service.
pub trait Geocoder: Send + Sync {
    /// Coordinates for `address`, or `None` when the service has no match.
    fn geocode(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Option<LatLon>, GeocodeError>> + Send;

    /// Display name for `point`, or `None` when the service has no match.
    fn reverse(
        &self,
        point: LatLon,
    ) -> impl Future<Output = Result<Option<String>, GeocodeError>> + Send;
}

/// A geocoder that never finds anything, for offline deployments.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGeocoder;

impl Geocoder for NoGeocoder {
    async fn geocode(&self, _address: &str) -> Result<Option<LatLon>, GeocodeError> {
        Ok(None)
    }

    async fn reverse(&self, _point: LatLon) -> Result<Option<String>, GeocodeError> {
        Ok(None)
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    display_name: Option<String>,
}

/// OpenStreetMap Nominatim client.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    region_suffix: Option<String>,
}

#[bon]
impl NominatimGeocoder {
    /// `region_suffix` (e.g. `"Singapore"`) is appended to addresses that do not mention it.
    #[builder]
    pub fn new(
        #[builder(default = NOMINATIM_URL.to_string(), into)] base_url: String,
        #[builder(into)] region_suffix: Option<String>,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(GeocodeError::ClientBuild)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            region_suffix,
        })
    }
}

impl NominatimGeocoder {
    /// The search string actually sent for `address`.
    pub fn qualify(&self, address: &str) -> String {
        match &self.region_suffix {
            Some(region) if !address.to_lowercase().contains(&region.to_lowercase()) => {
                format!("{}, {}", address, region)
            }
            _ => address.to_string(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, GeocodeError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| GeocodeError::NetworkRequest(url.to_string(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(match e.status() {
                    Some(status) => GeocodeError::HttpStatus {
                        url: url.to_string(),
                        status,
                        source: e,
                    },
                    None => GeocodeError::NetworkRequest(url.to_string(), e),
                });
            }
        };
        response
            .json::<T>()
            .await
            .map_err(|e| GeocodeError::NetworkRequest(url.to_string(), e))
    }
}

impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<LatLon>, GeocodeError> {
        let query = self.qualify(address);
        let url = format!("{}/search", self.base_url);
        let hits: Vec<SearchHit> = self
            .get(
                &url,
                &[
                    ("q", query.clone()),
                    ("format", "json".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        let Some(hit) = hits.into_iter().next() else {
            warn!("Geocoding found no results for '{}'", query);
            return Ok(None);
        };
        let lat = hit
            .lat
            .parse::<f64>()
            .map_err(|_| GeocodeError::InvalidCoordinate(hit.lat.clone()))?;
        let lon = hit
            .lon
            .parse::<f64>()
            .map_err(|_| GeocodeError::InvalidCoordinate(hit.lon.clone()))?;
        info!("Geocoded '{}': ({:.4}, {:.4})", query, lat, lon);
        Ok(Some(LatLon(lat, lon)))
    }

    async fn reverse(&self, point: LatLon) -> Result<Option<String>, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);
        let hit: ReverseHit = self
            .get(
                &url,
                &[
                    ("lat", point.latitude().to_string()),
                    ("lon", point.longitude().to_string()),
                    ("format", "json".to_string()),
                ],
            )
            .await?;
        debug!("Reverse geocoded {:?}: {:?}", point, hit.display_name);
        Ok(hit.display_name)
    }
}
