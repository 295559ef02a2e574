//! Consumer-facing view of the pipeline.
//!
//! A session takes raw input as it is typed plus a unit system, debounces the
//! input and re-requests the pipeline whenever the resulting query changes.

use std::{collections::HashSet, sync::Arc, time::Duration};
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        watch,
    },
    task::JoinHandle,
};
use tracing::warn;

use crate::{
    debounce::Debouncer,
    history::HistoryStore,
    model::{StableQuery, Unit},
    pipeline::{ResolutionPipeline, ResolutionState},
};

#[derive(Debug)]
pub struct ForecastSession {
    pipeline: ResolutionPipeline,
    input: Debouncer<String>,
    units: watch::Sender<Unit>,
    driver: JoinHandle<()>,
    recorder: Option<JoinHandle<()>>,
}

impl ForecastSession {
    /// Must be called inside a tokio runtime.
    pub fn new(pipeline: ResolutionPipeline, units: Unit, debounce: Duration) -> Self {
        let input = Debouncer::new(String::new(), debounce);
        let (units, units_rx) = watch::channel(units);
        let driver = tokio::spawn(drive(pipeline.clone(), input.subscribe(), units_rx));

        Self {
            pipeline,
            input,
            units,
            driver,
            recorder: None,
        }
    }

    /// Record every newly resolved canonical address in `history`.
    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        let resolved = self.pipeline.subscribe_resolved();
        if let Some(previous) = self.recorder.replace(tokio::spawn(record(resolved, history))) {
            previous.abort();
        }
        self
    }

    pub fn set_input(&self, raw: impl Into<String>) {
        self.input.set(raw.into());
    }

    pub fn set_units(&self, units: Unit) {
        self.units.send_if_modified(|current| {
            let changed = *current != units;
            *current = units;
            changed
        });
    }

    /// Request the current query again, e.g. after it failed.
    pub fn resubmit(&self) {
        let query = StableQuery::new(self.input.current(), self.units());
        tokio::spawn(self.pipeline.request(query));
    }

    pub fn units(&self) -> Unit {
        *self.units.borrow()
    }

    /// Address as last emitted by the debouncer.
    pub fn stable_address(&self) -> String {
        self.input.current()
    }

    pub fn state(&self) -> watch::Receiver<ResolutionState> {
        self.pipeline.state()
    }

    pub fn current_state(&self) -> ResolutionState {
        self.pipeline.current_state()
    }

    pub fn pipeline(&self) -> &ResolutionPipeline {
        &self.pipeline
    }

    /// Wait until `address` in the current unit system has settled.
    pub async fn settled_for(&self, address: &str) -> ResolutionState {
        let target = StableQuery::new(address, self.units());
        let mut states = self.pipeline.state();
        match states.wait_for(|state| state.is_settled_for(&target)).await {
            Ok(state) => state.clone(),
            Err(_) => self.pipeline.current_state(),
        }
    }
}

impl Drop for ForecastSession {
    fn drop(&mut self) {
        self.driver.abort();
        if let Some(recorder) = &self.recorder {
            recorder.abort();
        }
    }
}

async fn drive(
    pipeline: ResolutionPipeline,
    mut address: watch::Receiver<String>,
    mut units: watch::Receiver<Unit>,
) {
    let mut last: Option<StableQuery> = None;

    loop {
        let query = StableQuery::new(address.borrow_and_update().clone(), *units.borrow_and_update());

        if last.as_ref() != Some(&query) {
            last = Some(query.clone());
            tokio::spawn(pipeline.request(query));
        }

        tokio::select! {
            changed = address.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            changed = units.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}

async fn record(mut resolved: broadcast::Receiver<String>, history: Arc<dyn HistoryStore>) {
    let mut seen = HashSet::new();

    loop {
        match resolved.recv().await {
            Ok(address) => {
                if !seen.insert(address.clone()) {
                    continue;
                }
                let store = Arc::clone(&history);
                let entry = address.clone();
                // Stores may hit the filesystem.
                match tokio::task::spawn_blocking(move || store.append(&entry)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Failed to record '{}' in history: {e:#}", address),
                    Err(e) => warn!("History append for '{}' did not complete: {e}", address),
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("History recorder skipped {} resolved addresses", skipped);
            }
            Err(RecvError::Closed) => return,
        }
    }
}
