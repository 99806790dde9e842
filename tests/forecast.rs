mod common;

use chrono::TimeDelta;
use common::*;
use nowcast::{
    FailureKind, ForecastError, LatLon, NoGeocoder, Nowcast, NowcastConfig, NowcastError, Query,
    ResolvedBy, SelectionPath, SensorStore, Station, StationRegistry,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const ORIGIN: LatLon = LatLon(1.35, 103.85);

fn client(
    frames_dir: &Path,
    stations: Vec<Station>,
    sensors: SensorStore,
) -> Nowcast<StubGeocoder> {
    init_logging();
    Nowcast::builder()
        .registry(StationRegistry::from_stations(stations))
        .sensors(sensors)
        .frames(frame_index(frames_dir))
        .model(Arc::new(PersistenceModel))
        .geocoder(StubGeocoder)
        .build()
        .unwrap()
}

fn station_at(id: &str, name: &str, point: LatLon) -> Station {
    Station::new(id, name, point.latitude(), point.longitude())
}

/// Three stations around [`ORIGIN`]: two about 2 km away reporting no rain and
/// one 50 m away reporting 5 mm.
fn triangle(dir: &TempDir) -> Nowcast<StubGeocoder> {
    write_frames(dir.path(), 7);
    client(
        dir.path(),
        vec![
            station_at("S1", "North Gate", offset_km(ORIGIN, 2.0, -0.05)),
            station_at("S2", "South Gate", offset_km(ORIGIN, -2.0, -0.05)),
            station_at("S3", "Somerset Road", offset_km(ORIGIN, 0.0, 0.05)),
        ],
        SensorStore::from_series([series("S1", 7, 0.0), series("S2", 7, 0.0), series("S3", 7, 5.0)]),
    )
}

#[tokio::test]
async fn test_exact_match_station_dominates() {
    let dir = TempDir::new().unwrap();
    let client = triangle(&dir);

    let forecast = client.forecast(ORIGIN).await.unwrap();

    assert_eq!(forecast.selection_path, SelectionPath::Enclosure);
    assert_eq!(forecast.stations.len(), 3);
    assert_eq!(forecast.station_ids()[0], "S3");
    assert_eq!(forecast.rainfall_mm, 5.0);
    assert_eq!(forecast.outlook.to_string(), "Heavy Rain/Storm");
    assert_eq!(forecast.temperature, Some(28.0));
    assert_eq!(forecast.target_time, start() + TimeDelta::minutes(60));
    assert_eq!(forecast.location.resolved_by, ResolvedBy::Coordinates);
}

#[tokio::test]
async fn test_single_distant_station_is_clear() {
    let dir = TempDir::new().unwrap();
    write_frames(dir.path(), 7);
    let client = client(
        dir.path(),
        vec![station_at("S9", "Far Field", offset_km(ORIGIN, 8.0, 0.0))],
        SensorStore::from_series([series("S9", 7, 0.05)]),
    );

    let forecast = client.forecast(ORIGIN).await.unwrap();

    assert_eq!(forecast.selection_path, SelectionPath::Nearest);
    assert_eq!(forecast.station_ids(), vec!["S9"]);
    approx::assert_relative_eq!(forecast.rainfall_mm, 0.05, epsilon = 1e-6);
    approx::assert_relative_eq!(forecast.stations[0].distance_km, 8.0, epsilon = 1e-9);
    assert_eq!(forecast.outlook.to_string(), "Clear");
}

#[tokio::test]
async fn test_resolution_order() {
    let dir = TempDir::new().unwrap();
    let client = triangle(&dir);

    let by_id = client.forecast("S1").await.unwrap();
    assert_eq!(by_id.location.resolved_by, ResolvedBy::StationId);
    assert_eq!(by_id.location.station_id.as_deref(), Some("S1"));

    let by_name = client.forecast("somerset rd").await.unwrap();
    assert_eq!(by_name.location.resolved_by, ResolvedBy::StationName);
    assert_eq!(by_name.rainfall_mm, 5.0);

    let geocoded = client.forecast("Orchard Boulevard").await.unwrap();
    assert_eq!(geocoded.location.resolved_by, ResolvedBy::Geocoder);
    assert_eq!(geocoded.location.point, ORIGIN);
}

#[tokio::test]
async fn test_unresolvable_query_is_not_found() {
    let dir = TempDir::new().unwrap();
    let client = triangle(&dir);

    let err = client.forecast("Atlantis").await.unwrap_err();
    assert!(matches!(err, ForecastError::LocationNotFound(ref q) if q == "Atlantis"));
    assert_eq!(err.kind(), FailureKind::NotFound);
}

#[tokio::test]
async fn test_station_outside_radius() {
    let dir = TempDir::new().unwrap();
    write_frames(dir.path(), 7);
    let client = client(
        dir.path(),
        vec![station_at("S9", "Far Field", offset_km(ORIGIN, 12.0, 0.0))],
        SensorStore::from_series([series("S9", 7, 1.0)]),
    );

    let err = client.forecast(ORIGIN).await.unwrap_err();
    assert!(matches!(err, ForecastError::NoStationsInRange { radius_km, .. } if radius_km == 10.0));
    assert_eq!(err.kind(), FailureKind::InsufficientData);
}

#[tokio::test]
async fn test_missing_satellite_frame() {
    let dir = TempDir::new().unwrap();
    // Frames stop three buckets before the newest sensor row.
    write_frames(dir.path(), 4);
    let client = client(
        dir.path(),
        vec![station_at("S1", "North Gate", ORIGIN)],
        SensorStore::from_series([series("S1", 7, 1.0)]),
    );

    let err = client.forecast(ORIGIN).await.unwrap_err();
    assert!(matches!(err, ForecastError::InsufficientData { .. }));
    assert_eq!(err.kind(), FailureKind::InsufficientData);

    // The last framed bucket has only four rows behind it, short of a full window.
    let frames_end = start() + TimeDelta::minutes(30);
    let forecast = client.forecast_at(ORIGIN, Some(frames_end)).await;
    assert!(matches!(forecast, Err(ForecastError::InsufficientData { .. })));
}

#[tokio::test]
async fn test_target_between_buckets_uses_nearest() {
    let dir = TempDir::new().unwrap();
    let client = triangle(&dir);

    let target = start() + TimeDelta::minutes(63);
    let forecast = client.forecast_at("S3", Some(target)).await.unwrap();
    assert_eq!(forecast.target_time, target);
    assert_eq!(
        forecast.stations[0].observed_at,
        start() + TimeDelta::minutes(60)
    );
}

#[tokio::test]
async fn test_forecast_many_keeps_going() {
    let dir = TempDir::new().unwrap();
    let client = triangle(&dir);

    let results = client
        .forecast_many(vec![
            Query::from("S2"),
            Query::from("Atlantis"),
            Query::from(ORIGIN),
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[0].1.is_ok());
    assert_eq!(
        results[1].1.as_ref().map_err(|e| e.kind()).unwrap_err(),
        FailureKind::NotFound
    );
    assert_eq!(results[1].0, Query::Place("Atlantis".to_string()));
    assert_eq!(results[2].1.as_ref().unwrap().rainfall_mm, 5.0);
}

#[test]
fn test_missing_model_weights_fail_construction() {
    let dir = TempDir::new().unwrap();
    let mut config = NowcastConfig::default();
    config.forecast.model_weights = Some(dir.path().join("fusion.pt"));

    let result = Nowcast::builder()
        .config(config)
        .registry(StationRegistry::from_stations(vec![]))
        .sensors(SensorStore::default())
        .frames(frame_index(dir.path()))
        .model(Arc::new(PersistenceModel))
        .geocoder(NoGeocoder)
        .build();

    assert!(matches!(result, Err(NowcastError::ModelWeightsMissing(_))));
}

#[tokio::test]
async fn test_load_from_files() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let frames_dir = dir.path().join("processed_data");
    write_frames(&frames_dir, 7);

    let snapshot = dir.path().join("stations.json");
    let stations = vec![
        station_at("S1", "North Gate", offset_km(ORIGIN, 2.0, 0.0)),
        station_at("S2", "South Gate", offset_km(ORIGIN, -2.0, 0.0)),
    ];
    std::fs::write(&snapshot, serde_json::to_vec(&stations).unwrap()).unwrap();

    // Two raw readings per bucket; rainfall is summed, the rest averaged.
    let csv = dir.path().join("sensor_data.csv");
    let mut text = String::from("timestamp,sensor_id,temperature,rainfall,humidity,pm25\n");
    for i in 0..14 {
        let ts = start() + TimeDelta::minutes(5 * i);
        for (id, rain) in [("S1", 0.5), ("S2", 0.0)] {
            text.push_str(&format!(
                "{},{},{},{},80,20\n",
                ts.format("%Y-%m-%d %H:%M:%S"),
                id,
                27.0 + (i % 2) as f64,
                rain
            ));
        }
    }
    std::fs::write(&csv, text).unwrap();

    let mut config = NowcastConfig::default();
    config.frames = frame_config(&frames_dir);

    let client = Nowcast::load()
        .config(config)
        .sensor_csv(&csv)
        .station_snapshot(&snapshot)
        .model(Arc::new(PersistenceModel))
        .geocoder(NoGeocoder)
        .call()
        .await
        .unwrap();

    assert_eq!(client.registry().len(), 2);
    assert_eq!(client.sensors().len(), 2);
    assert_eq!(client.sensors().get("S1").unwrap().len(), 7);

    let forecast = client.forecast("S1").await.unwrap();
    approx::assert_relative_eq!(forecast.rainfall_mm, 1.0, epsilon = 1e-6);
    assert_eq!(forecast.temperature, Some(27.5));
    assert_eq!(forecast.outlook.to_string(), "Light Rain");
}
