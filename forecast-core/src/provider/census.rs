use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    error::{ResolveError, Stage},
    model::{Coordinates, GeocodeMatch},
    provider::fetch_json,
};

/// One-line address geocoder speaking the Census Bureau response format.
#[derive(Debug, Clone)]
pub struct GeocodeClient {
    http: Client,
    url: String,
    benchmark: String,
}

impl GeocodeClient {
    pub fn new(http: Client, url: impl Into<String>, benchmark: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            benchmark: benchmark.into(),
        }
    }

    /// Resolve `address` to the coordinates of its best match.
    ///
    /// Blank input is rejected before any request goes out.
    #[instrument(skip(self), fields(benchmark = %self.benchmark))]
    pub async fn resolve(&self, address: &str) -> Result<GeocodeMatch, ResolveError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ResolveError::InvalidInput);
        }

        let request = self.http.get(&self.url).query(&[
            ("address", address),
            ("benchmark", self.benchmark.as_str()),
            ("format", "json"),
        ]);

        let parsed: CensusResponse = fetch_json(request, Stage::Geocode).await?;

        let CensusResult { input, address_matches } = parsed.result;

        let best = address_matches
            .into_iter()
            .next()
            .ok_or_else(|| ResolveError::NotFound {
                address: address.to_string(),
            })?;

        let canonical_address = input
            .and_then(|i| i.address)
            .and_then(|a| a.address)
            .filter(|a| !a.trim().is_empty())
            .or(best.matched_address)
            .ok_or_else(|| ResolveError::upstream(Stage::Geocode, "response missing canonical address"))?;

        let coordinates = Coordinates {
            longitude: best.coordinates.x,
            latitude: best.coordinates.y,
        };

        debug!(
            "Geocoded '{}' to ({:.4}, {:.4})",
            canonical_address, coordinates.latitude, coordinates.longitude
        );

        Ok(GeocodeMatch {
            coordinates,
            canonical_address,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CensusResponse {
    result: CensusResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CensusResult {
    #[serde(default)]
    input: Option<CensusInput>,
    #[serde(default)]
    address_matches: Vec<CensusMatch>,
}

#[derive(Debug, Deserialize)]
struct CensusInput {
    #[serde(default)]
    address: Option<CensusInputAddress>,
}

#[derive(Debug, Deserialize)]
struct CensusInputAddress {
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CensusMatch {
    coordinates: CensusCoordinates,
    #[serde(default)]
    matched_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CensusCoordinates {
    x: f64,
    y: f64,
}
