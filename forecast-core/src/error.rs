use std::fmt;
use thiserror::Error;

/// Network stage of the resolution chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Geocode,
    Grid,
    Forecast,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Geocode => "geocode",
            Stage::Grid => "grid",
            Stage::Forecast => "forecast",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Upstream,
}

/// Why a query could not be resolved into a forecast.
///
/// Cloneable so that one coalesced outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("Address is empty")]
    InvalidInput,

    #[error("No location found for '{address}'")]
    NotFound { address: String },

    #[error("{stage} request failed: {detail}")]
    Upstream { stage: Stage, detail: String },
}

impl ResolveError {
    pub fn upstream(stage: Stage, detail: impl Into<String>) -> Self {
        Self::Upstream {
            stage,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Upstream { .. } => ErrorKind::Upstream,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::InvalidInput => None,
            Self::NotFound { .. } => Some(Stage::Geocode),
            Self::Upstream { stage, .. } => Some(*stage),
        }
    }

    /// Short message meant for end users. Details stay in `Display`.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidInput => "Please enter an address",
            Self::NotFound { .. } => "No coordinates found",
            Self::Upstream { stage, .. } => match stage {
                Stage::Geocode => "Geocoding failed",
                Stage::Grid => "Weather points fetch failed",
                Stage::Forecast => "Forecast fetch failed",
            },
        }
    }
}

/// Shortens upstream bodies before they end up in error details.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
