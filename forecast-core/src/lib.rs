//! Core library for the `forecast` CLI.
//!
//! Resolves a free-text address into a multi-day forecast by chaining three
//! public services: a one-line address geocoder, the weather provider's
//! grid-point lookup, and its gridpoint forecast.
//!
//! This crate defines:
//! - Configuration & search history persistence
//! - The three network stages behind async traits
//! - The resolution pipeline (caching, in-flight coalescing, request state)
//! - Input debouncing and a consumer-facing session
//!
//! It is used by `forecast-cli`, but can also be reused by other front ends.

pub mod cache;
pub mod config;
pub mod debounce;
pub mod error;
pub mod history;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod session;

pub use cache::{ForecastCache, Freshness};
pub use config::{Config, EndpointConfig};
pub use debounce::Debouncer;
pub use error::{ErrorKind, ResolveError, Stage};
pub use history::{FileHistory, HistoryStore, MemoryHistory};
pub use model::{
    Coordinates, DayNight, ForecastEndpoint, ForecastResult, GeocodeMatch, Period, StableQuery,
    Unit,
};
pub use pipeline::{ResolutionPipeline, ResolutionState};
pub use provider::{
    ForecastStage, GeocodeStage, GridStage, Stages,
    census::GeocodeClient,
    nws::{ForecastClient, GridResolver},
    stages_from_config,
};
pub use session::ForecastSession;
