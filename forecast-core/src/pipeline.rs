//! Address → coordinates → grid endpoint → forecast, as one keyed operation.
//!
//! A pipeline serves one consumer. Successful outcomes are cached per
//! [`StableQuery`]; concurrent requests for the same query share a single
//! chain. The published [`ResolutionState`] only ever reflects the most
//! recently requested query: outcomes of superseded requests are dropped.

use futures::{
    FutureExt,
    future::{self, BoxFuture, Shared},
};
use parking_lot::Mutex;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::{
    Config,
    cache::{ForecastCache, Freshness},
    error::ResolveError,
    model::{ForecastResult, StableQuery},
    provider::{Stages, stages_from_config},
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResolutionState {
    #[default]
    Idle,
    Loading(StableQuery),
    Success {
        query: StableQuery,
        result: Arc<ForecastResult>,
    },
    Error {
        error: ResolveError,
        query: StableQuery,
    },
}

impl ResolutionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    pub fn query(&self) -> Option<&StableQuery> {
        match self {
            Self::Idle => None,
            Self::Loading(query) | Self::Success { query, .. } | Self::Error { query, .. } => {
                Some(query)
            }
        }
    }

    pub fn result(&self) -> Option<&ForecastResult> {
        match self {
            Self::Success { result, .. } => Some(&**result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ResolveError> {
        match self {
            Self::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// True once `query` has reached a terminal state (or `Idle` for an empty query).
    pub fn is_settled_for(&self, query: &StableQuery) -> bool {
        match self {
            Self::Idle => query.is_empty(),
            Self::Loading(_) => false,
            Self::Success { query: q, .. } | Self::Error { query: q, .. } => q == query,
        }
    }
}

type Resolution = Result<Arc<ForecastResult>, ResolveError>;
type SharedResolution = Shared<BoxFuture<'static, Resolution>>;

struct Inner {
    stages: Stages,
    cache: Arc<ForecastCache>,
    in_flight: Mutex<HashMap<StableQuery, SharedResolution>>,
    // Ticket of the latest request; only its outcome may be published.
    active: Mutex<u64>,
    state: watch::Sender<ResolutionState>,
    resolved: broadcast::Sender<String>,
}

#[derive(Clone)]
pub struct ResolutionPipeline {
    inner: Arc<Inner>,
}

impl fmt::Debug for ResolutionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionPipeline")
            .field("stages", &self.inner.stages)
            .field("cached", &self.inner.cache.len())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}

enum Begun {
    Settled(ResolutionState),
    Pending(u64),
}

impl ResolutionPipeline {
    pub fn new(stages: Stages, cache: Arc<ForecastCache>) -> Self {
        let (state, _) = watch::channel(ResolutionState::Idle);
        let (resolved, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                stages,
                cache,
                in_flight: Mutex::new(HashMap::new()),
                active: Mutex::new(0),
                state,
                resolved,
            }),
        }
    }

    /// HTTP-backed pipeline with a fresh cache.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let stages = stages_from_config(config)?;
        let cache = Arc::new(ForecastCache::new(Freshness::from(config.cache_ttl())));
        Ok(Self::new(stages, cache))
    }

    pub fn cache(&self) -> &Arc<ForecastCache> {
        &self.inner.cache
    }

    pub fn state(&self) -> watch::Receiver<ResolutionState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> ResolutionState {
        self.inner.state.borrow().clone()
    }

    /// Canonical address of every published success. Subscribers de-duplicate.
    pub fn subscribe_resolved(&self) -> broadcast::Receiver<String> {
        self.inner.resolved.subscribe()
    }

    /// Make `query` the active request and drive it to a terminal state.
    ///
    /// The state transition happens before this returns; the future only
    /// waits for the network. It resolves to the state current once the
    /// request is done, which for a superseded request is the newer one's.
    pub fn request(&self, query: StableQuery) -> BoxFuture<'static, ResolutionState> {
        match self.begin(&query) {
            Begun::Settled(state) => future::ready(state).boxed(),
            Begun::Pending(ticket) => {
                let this = self.clone();
                async move { this.complete(ticket, query).await }.boxed()
            }
        }
    }

    fn begin(&self, query: &StableQuery) -> Begun {
        let mut active = self.inner.active.lock();
        *active += 1;

        if query.is_empty() {
            self.inner.state.send_replace(ResolutionState::Idle);
            return Begun::Settled(ResolutionState::Idle);
        }

        if query.address.trim().is_empty() {
            let state = ResolutionState::Error {
                error: ResolveError::InvalidInput,
                query: query.clone(),
            };
            self.inner.state.send_replace(state.clone());
            return Begun::Settled(state);
        }

        if let Some(result) = self.inner.cache.read(query) {
            debug!(%query, "Serving forecast from cache");
            let state = ResolutionState::Success {
                query: query.clone(),
                result: Arc::clone(&result),
            };
            self.inner.state.send_replace(state.clone());
            drop(active);
            self.announce(&result);
            return Begun::Settled(state);
        }

        self.inner.state.send_replace(ResolutionState::Loading(query.clone()));
        Begun::Pending(*active)
    }

    async fn complete(&self, ticket: u64, query: StableQuery) -> ResolutionState {
        let outcome = self.resolve(&query).await;

        let active = self.inner.active.lock();
        if *active != ticket {
            debug!(%query, "Dropping outcome of superseded request");
            return self.current_state();
        }

        let state = match outcome {
            Ok(result) => ResolutionState::Success { query, result },
            Err(error) => {
                warn!(%query, kind = ?error.kind(), stage = ?error.stage(), "Resolution failed: {error}");
                ResolutionState::Error { error, query }
            }
        };
        self.inner.state.send_replace(state.clone());
        drop(active);

        if let ResolutionState::Success { result, .. } = &state {
            self.announce(result);
        }
        state
    }

    fn announce(&self, result: &ForecastResult) {
        info!("Resolved forecast for '{}'", result.canonical_address);
        // No subscribers is fine.
        let _ = self.inner.resolved.send(result.canonical_address.clone());
    }

    /// Resolve `query` without touching the published state.
    ///
    /// Serves from cache when possible and otherwise joins the chain already
    /// running for `query`, starting one if there is none.
    pub async fn resolve(&self, query: &StableQuery) -> Resolution {
        if query.address.trim().is_empty() {
            return Err(ResolveError::InvalidInput);
        }

        if let Some(result) = self.inner.cache.read(query) {
            debug!(%query, "Cache hit");
            return Ok(result);
        }

        let pending = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(pending) = in_flight.get(query) {
                debug!(%query, "Joining in-flight resolution");
                pending.clone()
            } else if let Some(result) = self.inner.cache.read(query) {
                // Completed between the first cache read and taking the lock.
                return Ok(result);
            } else {
                let pending = run_chain(Arc::clone(&self.inner), query.clone())
                    .boxed()
                    .shared();
                in_flight.insert(query.clone(), pending.clone());
                pending
            }
        };

        pending.await
    }
}

async fn run_chain(inner: Arc<Inner>, query: StableQuery) -> Resolution {
    let outcome = chain(&inner.stages, &query).await.map(Arc::new);

    match &outcome {
        Ok(result) => inner.cache.write(query.clone(), Arc::clone(result)),
        Err(e) => debug!(%query, kind = ?e.kind(), "Resolution chain failed: {e}"),
    }

    // Cache first: a caller that misses the in-flight entry must hit the cache.
    inner.in_flight.lock().remove(&query);
    outcome
}

async fn chain(stages: &Stages, query: &StableQuery) -> Result<ForecastResult, ResolveError> {
    debug!(%query, "Starting resolution chain");

    let found = stages.geocoder.geocode(&query.address).await?;
    let endpoint = stages.grid.forecast_endpoint(found.coordinates).await?;
    let periods = stages.forecast.periods(&endpoint, query.units).await?;

    Ok(ForecastResult {
        periods,
        canonical_address: found.canonical_address,
    })
}
