use crate::{
    Config,
    error::{ResolveError, Stage, truncate_body},
    model::{Coordinates, ForecastEndpoint, GeocodeMatch, Period, Unit},
    provider::{census::GeocodeClient, nws::{ForecastClient, GridResolver}},
};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::warn;

pub mod census;
pub mod nws;

/// Address → coordinates plus the geocoder's spelling of the address.
#[async_trait]
pub trait GeocodeStage: Send + Sync + Debug {
    async fn geocode(&self, address: &str) -> Result<GeocodeMatch, ResolveError>;
}

/// Coordinates → forecast endpoint of the covering grid cell.
#[async_trait]
pub trait GridStage: Send + Sync + Debug {
    async fn forecast_endpoint(&self, coords: Coordinates) -> Result<ForecastEndpoint, ResolveError>;
}

/// Forecast endpoint → ordered periods in the requested unit system.
#[async_trait]
pub trait ForecastStage: Send + Sync + Debug {
    async fn periods(&self, endpoint: &ForecastEndpoint, units: Unit) -> Result<Vec<Period>, ResolveError>;
}

#[async_trait]
impl GeocodeStage for GeocodeClient {
    async fn geocode(&self, address: &str) -> Result<GeocodeMatch, ResolveError> {
        self.resolve(address).await
    }
}

#[async_trait]
impl GridStage for GridResolver {
    async fn forecast_endpoint(&self, coords: Coordinates) -> Result<ForecastEndpoint, ResolveError> {
        self.resolve(coords).await
    }
}

#[async_trait]
impl ForecastStage for ForecastClient {
    async fn periods(&self, endpoint: &ForecastEndpoint, units: Unit) -> Result<Vec<Period>, ResolveError> {
        self.fetch(endpoint, units).await
    }
}

/// The three stages a pipeline chains together.
#[derive(Debug, Clone)]
pub struct Stages {
    pub geocoder: Arc<dyn GeocodeStage>,
    pub grid: Arc<dyn GridStage>,
    pub forecast: Arc<dyn ForecastStage>,
}

/// Build the HTTP-backed stages from config.
pub fn stages_from_config(config: &Config) -> anyhow::Result<Stages> {
    let endpoints = &config.endpoints;

    let http = Client::builder()
        .user_agent(endpoints.user_agent.as_str())
        .timeout(Duration::from_secs(endpoints.timeout_secs))
        .build()
        .context("Failed to build HTTP client")?;

    Ok(Stages {
        geocoder: Arc::new(GeocodeClient::new(
            http.clone(),
            endpoints.geocoder_url.as_str(),
            endpoints.benchmark.as_str(),
        )),
        grid: Arc::new(GridResolver::new(http.clone(), endpoints.weather_api_url.as_str())),
        forecast: Arc::new(ForecastClient::new(http)),
    })
}

/// Send `request` and decode a JSON body, mapping every failure onto `stage`.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: RequestBuilder,
    stage: Stage,
) -> Result<T, ResolveError> {
    let res = request
        .send()
        .await
        .map_err(|e| ResolveError::upstream(stage, format!("failed to send request: {e}")))?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|e| ResolveError::upstream(stage, format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        warn!(%stage, %status, "upstream returned non-success status");
        return Err(ResolveError::upstream(
            stage,
            format!("status {}: {}", status, truncate_body(&body)),
        ));
    }

    serde_json::from_str(&body).map_err(|e| {
        warn!(%stage, error = %e, "upstream returned malformed payload");
        ResolveError::upstream(stage, format!("malformed payload: {e}"))
    })
}
