use moka::sync::Cache;
use std::{fmt, sync::Arc, time::Duration};

use crate::model::{ForecastResult, StableQuery};

/// How long a cached forecast may be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    #[default]
    Unbounded,
    Ttl(Duration),
}

impl From<Option<Duration>> for Freshness {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(Freshness::Unbounded, Freshness::Ttl)
    }
}

/// Successful resolutions keyed by query. Failures are never stored.
#[derive(Clone)]
pub struct ForecastCache {
    entries: Cache<StableQuery, Arc<ForecastResult>>,
    freshness: Freshness,
}

impl fmt::Debug for ForecastCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecastCache")
            .field("entries", &self.len())
            .field("freshness", &self.freshness)
            .finish()
    }
}

impl Default for ForecastCache {
    fn default() -> Self {
        Self::new(Freshness::Unbounded)
    }
}

impl ForecastCache {
    pub fn new(freshness: Freshness) -> Self {
        let mut builder = Cache::builder();
        if let Freshness::Ttl(ttl) = freshness {
            builder = builder.time_to_live(ttl);
        }

        Self {
            entries: builder.build(),
            freshness,
        }
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// Expired entries read as absent.
    pub fn read(&self, query: &StableQuery) -> Option<Arc<ForecastResult>> {
        self.entries.get(query)
    }

    pub fn write(&self, query: StableQuery, result: Arc<ForecastResult>) {
        self.entries.insert(query, result);
    }

    pub fn contains(&self, query: &StableQuery) -> bool {
        self.entries.contains_key(query)
    }

    /// Live entries; expired and invalidated ones are skipped.
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }
}
