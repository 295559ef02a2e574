//! National Weather Service API: grid-point lookup and gridpoint forecasts.
//!
//! Coordinates resolve to a forecast office grid cell via `/points/{lat},{lon}`;
//! the returned `properties.forecast` URL serves 12-hour periods, day first.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    error::{ResolveError, Stage},
    model::{Coordinates, ForecastEndpoint, Period, Unit},
    provider::fetch_json,
};

#[derive(Debug, Clone)]
pub struct GridResolver {
    http: Client,
    base_url: String,
}

impl GridResolver {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, coords: Coordinates) -> Result<ForecastEndpoint, ResolveError> {
        // The points endpoint redirects on more than four decimals.
        let url = format!(
            "{}/points/{:.4},{:.4}",
            self.base_url, coords.latitude, coords.longitude
        );

        let parsed: PointsResponse = fetch_json(self.http.get(&url), Stage::Grid).await?;

        let forecast = parsed
            .properties
            .and_then(|p| p.forecast)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| ResolveError::upstream(Stage::Grid, "response missing properties.forecast"))?;

        debug!("Resolved grid forecast endpoint {}", forecast);
        Ok(ForecastEndpoint(forecast))
    }
}

#[derive(Debug, Clone)]
pub struct ForecastClient {
    http: Client,
}

impl ForecastClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    #[instrument(skip(self, endpoint), fields(endpoint = %endpoint))]
    pub async fn fetch(&self, endpoint: &ForecastEndpoint, units: Unit) -> Result<Vec<Period>, ResolveError> {
        let request = self
            .http
            .get(endpoint.as_str())
            .query(&[("units", units.as_query_param())]);

        let parsed: ForecastResponse = fetch_json(request, Stage::Forecast).await?;

        debug!("Fetched {} forecast periods", parsed.properties.periods.len());
        Ok(parsed.properties.periods)
    }
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: Option<PointsProperties>,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    forecast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<Period>,
}
