use crate::inflight::Inflight;
use crate::models::SearchResultSummary;
use crate::omdb::{OmdbApi, SearchOutcome, NO_MOVIES_FOUND};
use anyhow::Result;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

/// Queries shorter than this (after trimming) clear the session without a request.
pub const MIN_QUERY_CHARS: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<SearchResultSummary>,
    pub is_loading: bool,
    pub error: Option<String>,
}

type QueryHook = Box<dyn Fn(&str) + Send + Sync>;

/// Lifecycle of the current title search.
///
/// `set_query` is the only input. Every state change is published on a
/// `watch` channel before the call (or the settling request) returns. Must be
/// driven from inside a Tokio runtime since requests run on spawned tasks.
pub struct SearchSession {
    gateway: Arc<dyn OmdbApi>,
    shared: Arc<Shared>,
    on_query_change: Option<QueryHook>,
}

struct Shared {
    inflight: Mutex<Inflight>,
    state: watch::Sender<SearchState>,
}

impl SearchSession {
    pub fn new(gateway: Arc<dyn OmdbApi>) -> Self {
        let (state, _) = watch::channel(SearchState::default());
        Self {
            gateway,
            shared: Arc::new(Shared {
                inflight: Mutex::new(Inflight::default()),
                state,
            }),
            on_query_change: None,
        }
    }

    /// Runs `hook` on every `set_query`, before any request is issued.
    pub fn on_query_change(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_query_change = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> SearchState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.shared.state.subscribe()
    }

    pub fn set_query(&self, query: &str) {
        if let Some(hook) = &self.on_query_change {
            hook(query);
        }

        let mut inflight = self.shared.lock();
        let generation = inflight.supersede();
        let trimmed = query.trim();

        if trimmed.chars().count() < MIN_QUERY_CHARS {
            self.shared.state.send_modify(|s| {
                s.query = query.to_string();
                s.results.clear();
                s.is_loading = false;
                s.error = None;
            });
            return;
        }

        self.shared.state.send_modify(|s| {
            s.query = query.to_string();
            s.is_loading = true;
            s.error = None;
        });
        let token = inflight.token();
        drop(inflight);

        let gateway = self.gateway.clone();
        let shared = self.shared.clone();
        let query = trimmed.to_string();
        debug!(query = %query, generation, "Issuing search");
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!(query = %query, generation, "Search superseded before completion");
                    return;
                }
                res = gateway.search(&query) => res,
            };
            shared.settle(generation, result);
        });
    }
}

impl Shared {
    fn settle(&self, generation: u64, result: Result<SearchOutcome>) {
        let mut inflight = self.lock();
        if !inflight.is_current(generation) {
            debug!(generation, "Discarding stale search response");
            return;
        }
        inflight.finish(generation);
        self.state.send_modify(|s| {
            s.is_loading = false;
            match result {
                Ok(SearchOutcome::Found(results)) => {
                    s.results = results;
                    s.error = None;
                }
                Ok(SearchOutcome::NotFound) => {
                    s.results.clear();
                    s.error = Some(NO_MOVIES_FOUND.to_string());
                }
                // Results from the last successful search stay visible.
                Err(e) => s.error = Some(format!("{e:#}")),
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inflight> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }
}
