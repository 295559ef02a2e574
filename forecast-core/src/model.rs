use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::{convert::TryFrom, fmt};

/// Unit system a forecast is requested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Metric,
    #[default]
    Imperial,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    /// Value of the `units` query parameter understood by the forecast endpoint.
    pub fn as_query_param(&self) -> &'static str {
        match self {
            Unit::Metric => "si",
            Unit::Imperial => "us",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Unit::Metric => Unit::Imperial,
            Unit::Imperial => Unit::Metric,
        }
    }

    pub const fn all() -> &'static [Unit] {
        &[Unit::Imperial, Unit::Metric]
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Unit {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" | "si" => Ok(Unit::Metric),
            "imperial" | "us" => Ok(Unit::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported: metric (si), imperial (us)."
            )),
        }
    }
}

/// A debounced address paired with a unit system. Cache and in-flight key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StableQuery {
    pub address: String,
    pub units: Unit,
}

impl StableQuery {
    pub fn new(address: impl Into<String>, units: Unit) -> Self {
        Self {
            address: address.into(),
            units,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_empty()
    }
}

impl fmt::Display for StableQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address, self.units)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

/// Best geocoding match: where it is, and how the geocoder spells it.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub coordinates: Coordinates,
    pub canonical_address: String,
}

/// Forecast URL handed out by the grid-point lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastEndpoint(pub String);

impl ForecastEndpoint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ForecastEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantitativeValue {
    #[serde(default)]
    pub unit_code: String,
    pub value: Option<f64>,
}

/// One forecast time slot as returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub number: u32,
    pub name: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub is_daytime: bool,
    pub temperature: f64,
    pub temperature_unit: String,
    #[serde(default)]
    pub temperature_trend: Option<String>,
    #[serde(default)]
    pub probability_of_precipitation: Option<QuantitativeValue>,
    #[serde(default)]
    pub wind_speed: Option<String>,
    #[serde(default)]
    pub wind_direction: Option<String>,
    pub icon: String,
    pub short_forecast: String,
    pub detailed_forecast: String,
}

impl Period {
    /// Chance of precipitation in percent; missing values read as 0.
    pub fn precipitation_chance(&self) -> f64 {
        self.probability_of_precipitation
            .as_ref()
            .and_then(|p| p.value)
            .unwrap_or(0.0)
    }
}

/// A day period and the night that follows it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayNight<'a> {
    pub day: &'a Period,
    pub night: &'a Period,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub periods: Vec<Period>,
    pub canonical_address: String,
}

impl ForecastResult {
    /// Pairs period `2i` with `2i + 1`. A trailing unpaired period is dropped.
    pub fn grouped_periods(&self) -> Vec<DayNight<'_>> {
        self.periods
            .chunks_exact(2)
            .map(|pair| DayNight {
                day: &pair[0],
                night: &pair[1],
            })
            .collect()
    }
}
