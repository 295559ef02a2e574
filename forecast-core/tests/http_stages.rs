//! HTTP stages and the full pipeline against WireMock upstreams.

use std::sync::Arc;

use forecast_core::{
    Config, Coordinates, ErrorKind, ForecastCache, ForecastClient, ForecastEndpoint, GeocodeClient,
    GridResolver, ResolutionPipeline, ResolveError, Stage, StableQuery, Unit, stages_from_config,
};
use reqwest::Client;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

// =============================================================================
// Test Helpers
// =============================================================================

const SILVER_HILL: &str = "4600 Silver Hill Rd, Washington, DC 20233";
const SILVER_HILL_CANONICAL: &str = "4600 SILVER HILL RD, WASHINGTON, DC, 20233";

fn geocode_response() -> serde_json::Value {
    serde_json::json!({
        "result": {
            "input": {
                "address": { "address": SILVER_HILL_CANONICAL },
                "benchmark": { "id": "4", "benchmarkName": "Public_AR_Current" }
            },
            "addressMatches": [{
                "matchedAddress": "4600 SILVER HILL RD, WASHINGTON, DC, 20233",
                "coordinates": { "x": -76.92744, "y": 38.845985 }
            }]
        }
    })
}

fn no_match_response(address: &str) -> serde_json::Value {
    serde_json::json!({
        "result": {
            "input": { "address": { "address": address } },
            "addressMatches": []
        }
    })
}

fn points_response(forecast_url: &str) -> serde_json::Value {
    serde_json::json!({
        "properties": {
            "gridId": "LWX",
            "gridX": 97,
            "gridY": 67,
            "forecast": forecast_url
        }
    })
}

fn period_json(number: u32, is_daytime: bool, unit: &str) -> serde_json::Value {
    let name = if is_daytime { "Tuesday" } else { "Tuesday Night" };
    serde_json::json!({
        "number": number,
        "name": name,
        "startTime": "2025-06-03T06:00:00-04:00",
        "endTime": "2025-06-03T18:00:00-04:00",
        "isDaytime": is_daytime,
        "temperature": 81,
        "temperatureUnit": unit,
        "probabilityOfPrecipitation": { "unitCode": "wmoUnit:percent", "value": 20 },
        "windSpeed": "5 to 10 mph",
        "windDirection": "NW",
        "icon": "https://api.weather.gov/icons/land/day/few?size=medium",
        "shortForecast": "Sunny",
        "detailedForecast": "Sunny, with a high near 81."
    })
}

fn forecast_response(count: u32, unit: &str) -> serde_json::Value {
    let periods: Vec<_> = (1..=count).map(|n| period_json(n, n % 2 == 1, unit)).collect();
    serde_json::json!({ "properties": { "periods": periods } })
}

fn config_for(server: &MockServer) -> Config {
    let mut cfg = Config::default();
    cfg.endpoints.geocoder_url = format!("{}/geocoder/locations/onelineaddress", server.uri());
    cfg.endpoints.weather_api_url = server.uri();
    cfg.endpoints.user_agent = "forecast-tests".to_string();
    cfg
}

async fn mount_happy_path(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/geocoder/locations/onelineaddress"))
        .and(query_param("address", SILVER_HILL))
        .and(query_param("benchmark", "4"))
        .and(query_param("format", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(geocode_response()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/points/38.8460,-76.9274"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(points_response(&format!("{}/gridpoints/LWX/97,67/forecast", server.uri()))),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gridpoints/LWX/97,67/forecast"))
        .and(query_param("units", "us"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_response(14, "F")))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gridpoints/LWX/97,67/forecast"))
        .and(query_param("units", "si"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_response(14, "C")))
        .mount(server)
        .await;
}

// =============================================================================
// Geocode Tests
// =============================================================================

#[tokio::test]
async fn geocode_returns_coordinates_and_canonical_address() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let client = GeocodeClient::new(
        Client::new(),
        format!("{}/geocoder/locations/onelineaddress", server.uri()),
        "4",
    );
    let found = client.resolve(SILVER_HILL).await.expect("geocode should succeed");

    assert_eq!(found.canonical_address, SILVER_HILL_CANONICAL);
    assert!((found.coordinates.longitude - -76.92744).abs() < 1e-9);
    assert!((found.coordinates.latitude - 38.845985).abs() < 1e-9);
}

#[tokio::test]
async fn geocode_without_matches_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(no_match_response("asdkjalksjd")))
        .mount(&server)
        .await;

    let client = GeocodeClient::new(Client::new(), format!("{}/geocode", server.uri()), "4");
    let err = client.resolve("asdkjalksjd").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn geocode_server_error_is_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = GeocodeClient::new(Client::new(), format!("{}/geocode", server.uri()), "4");
    let err = client.resolve(SILVER_HILL).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(err.stage(), Some(Stage::Geocode));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn geocode_malformed_payload_is_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocode"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = GeocodeClient::new(Client::new(), format!("{}/geocode", server.uri()), "4");
    let err = client.resolve(SILVER_HILL).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(err.to_string().contains("malformed payload"));
}

// =============================================================================
// Grid & Forecast Tests
// =============================================================================

#[tokio::test]
async fn grid_without_forecast_field_is_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/points/38.8460,-76.9274"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "properties": {} })))
        .mount(&server)
        .await;

    let grid = GridResolver::new(Client::new(), server.uri());
    let err = grid
        .resolve(Coordinates {
            longitude: -76.92744,
            latitude: 38.845985,
        })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ResolveError::upstream(Stage::Grid, "response missing properties.forecast")
    );
}

#[tokio::test]
async fn forecast_passes_units_and_keeps_order() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let client = ForecastClient::new(Client::new());
    let endpoint = ForecastEndpoint(format!("{}/gridpoints/LWX/97,67/forecast", server.uri()));
    let periods = client.fetch(&endpoint, Unit::Metric).await.expect("forecast should succeed");

    assert_eq!(periods.len(), 14);
    assert!(periods.iter().all(|p| p.temperature_unit == "C"));
    for (i, period) in periods.iter().enumerate() {
        assert_eq!(period.number as usize, i + 1);
        assert_eq!(period.is_daytime, i % 2 == 0);
    }
    assert_eq!(periods[0].precipitation_chance(), 20.0);
}

#[tokio::test]
async fn forecast_server_error_is_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forecast"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Unexpected Problem"))
        .mount(&server)
        .await;

    let client = ForecastClient::new(Client::new());
    let err = client
        .fetch(&ForecastEndpoint(format!("{}/forecast", server.uri())), Unit::Imperial)
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(Stage::Forecast));
    assert_eq!(err.user_message(), "Forecast fetch failed");
}

// =============================================================================
// Pipeline Tests
// =============================================================================

#[tokio::test]
async fn pipeline_resolves_silver_hill_end_to_end() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let pipeline = ResolutionPipeline::from_config(&config_for(&server)).unwrap();
    let state = pipeline.request(StableQuery::new(SILVER_HILL, Unit::Imperial)).await;

    let result = state.result().expect("pipeline should succeed");
    assert_eq!(result.canonical_address, SILVER_HILL_CANONICAL);
    assert_eq!(result.periods.len() % 2, 0);
    assert!(result.periods[0].is_daytime);
    assert_eq!(result.grouped_periods().len(), 7);
}

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let pipeline = ResolutionPipeline::from_config(&config_for(&server)).unwrap();
    let q = StableQuery::new(SILVER_HILL, Unit::Imperial);

    pipeline.request(q.clone()).await;
    let after_first = server.received_requests().await.unwrap().len();
    assert_eq!(after_first, 3);

    let again = pipeline.request(q).await;
    assert!(again.result().is_some());
    assert_eq!(server.received_requests().await.unwrap().len(), after_first);

    // Other unit system: all three stages again.
    pipeline.request(StableQuery::new(SILVER_HILL, Unit::Metric)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 6);
}

#[tokio::test]
async fn concurrent_requests_hit_upstream_once() {
    let server = MockServer::start().await;
    mount_happy_path(&server).await;

    let stages = stages_from_config(&config_for(&server)).unwrap();
    let pipeline = ResolutionPipeline::new(stages, Arc::new(ForecastCache::default()));
    let q = StableQuery::new(SILVER_HILL, Unit::Imperial);

    let (a, b) = tokio::join!(pipeline.resolve(&q), pipeline.resolve(&q));

    assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn unknown_address_leaves_cache_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/geocoder/locations/onelineaddress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(no_match_response("asdkjalksjd")))
        .mount(&server)
        .await;

    let pipeline = ResolutionPipeline::from_config(&config_for(&server)).unwrap();
    let state = pipeline.request(StableQuery::new("asdkjalksjd", Unit::Imperial)).await;

    assert_eq!(state.error().map(ResolveError::kind), Some(ErrorKind::NotFound));
    assert!(pipeline.cache().is_empty());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
