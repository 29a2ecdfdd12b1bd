use crate::inflight::Inflight;
use crate::models::MovieDetail;
use crate::omdb::OmdbApi;
use anyhow::Result;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetailState {
    pub selected_id: Option<String>,
    pub detail: Option<MovieDetail>,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Which movie is open, and the detail record fetched for it.
pub struct SelectionController {
    gateway: Arc<dyn OmdbApi>,
    shared: Arc<Shared>,
}

struct Shared {
    inflight: Mutex<Inflight>,
    state: watch::Sender<DetailState>,
}

impl SelectionController {
    pub fn new(gateway: Arc<dyn OmdbApi>) -> Self {
        let (state, _) = watch::channel(DetailState::default());
        Self {
            gateway,
            shared: Arc::new(Shared {
                inflight: Mutex::new(Inflight::default()),
                state,
            }),
        }
    }

    pub fn selected_id(&self) -> Option<String> {
        self.shared.state.borrow().selected_id.clone()
    }

    pub fn detail_state(&self) -> DetailState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetailState> {
        self.shared.state.subscribe()
    }

    /// Selecting the open id again closes it.
    pub fn toggle(&self, id: &str) {
        let next = match self.selected_id() {
            Some(current) if current == id => None,
            _ => Some(id.to_string()),
        };
        self.select(next);
    }

    pub fn close(&self) {
        self.select(None);
    }

    /// Closes only while `id` is still the open movie. Returns whether it closed.
    pub fn close_if_selected(&self, id: &str) -> bool {
        let inflight = self.shared.lock();
        if self.shared.state.borrow().selected_id.as_deref() != Some(id) {
            return false;
        }
        self.select_locked(inflight, None);
        true
    }

    fn select(&self, next: Option<String>) {
        let inflight = self.shared.lock();
        self.select_locked(inflight, next);
    }

    fn select_locked(&self, mut inflight: MutexGuard<'_, Inflight>, next: Option<String>) {
        let generation = inflight.supersede();
        self.shared.state.send_replace(DetailState {
            selected_id: next.clone(),
            detail: None,
            is_loading: next.is_some(),
            error: None,
        });
        let Some(id) = next else {
            return;
        };
        let token = inflight.token();
        drop(inflight);

        let gateway = self.gateway.clone();
        let shared = self.shared.clone();
        debug!(id = %id, generation, "Fetching movie detail");
        tokio::spawn(async move {
            let result = tokio::select! {
                _ = token.cancelled() => {
                    debug!(id = %id, "Detail fetch superseded");
                    return;
                }
                res = gateway.fetch_detail(&id) => res,
            };
            shared.settle(generation, &id, result);
        });
    }
}

impl Shared {
    fn settle(&self, generation: u64, id: &str, result: Result<MovieDetail>) {
        let mut inflight = self.lock();
        if !inflight.is_current(generation)
            || self.state.borrow().selected_id.as_deref() != Some(id)
        {
            debug!(id, "Discarding stale detail response");
            return;
        }
        inflight.finish(generation);
        self.state.send_modify(|s| {
            s.is_loading = false;
            match result {
                Ok(detail) => s.detail = Some(detail),
                Err(e) => {
                    warn!(id, "Detail fetch failed: {:#}", e);
                    s.error = Some(format!("{e:#}"));
                }
            }
        });
    }

    fn lock(&self) -> MutexGuard<'_, Inflight> {
        self.inflight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::omdb::SearchOutcome;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::oneshot;

    type Reply = Result<MovieDetail>;

    #[derive(Default)]
    struct GatedDetails {
        calls: Mutex<Vec<String>>,
        gates: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
    }

    impl GatedDetails {
        fn gate(&self, id: &str) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(id.to_string(), rx);
            tx
        }
    }

    #[async_trait]
    impl OmdbApi for GatedDetails {
        async fn search(&self, _query: &str) -> Result<SearchOutcome> {
            Ok(SearchOutcome::NotFound)
        }

        async fn fetch_detail(&self, id: &str) -> Result<MovieDetail> {
            self.calls.lock().unwrap().push(id.to_string());
            let gate = self.gates.lock().unwrap().remove(id);
            match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(anyhow!("gate dropped"))),
                None => Ok(detail(id)),
            }
        }
    }

    fn detail(id: &str) -> MovieDetail {
        MovieDetail {
            id: id.to_string(),
            title: format!("Movie {id}"),
            year: "2010".to_string(),
            poster_url: String::new(),
            runtime_minutes: "100 min".to_string(),
            imdb_rating: 7.5,
            plot: String::new(),
            release_date: String::new(),
            actors: String::new(),
            director: String::new(),
            genre: String::new(),
        }
    }

    async fn loaded(controller: &SelectionController) -> DetailState {
        let mut rx = controller.subscribe();
        let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| !s.is_loading))
            .await
            .expect("detail did not settle")
            .expect("controller dropped")
            .clone();
        state
    }

    #[tokio::test]
    async fn toggle_twice_clears_selection() {
        let controller = SelectionController::new(Arc::new(GatedDetails::default()));
        controller.toggle("tt1");
        assert_eq!(controller.selected_id().as_deref(), Some("tt1"));
        controller.toggle("tt1");
        assert_eq!(controller.selected_id(), None);
        assert!(!controller.detail_state().is_loading);
    }

    #[tokio::test]
    async fn selecting_fetches_detail_once() {
        let gateway = Arc::new(GatedDetails::default());
        let controller = SelectionController::new(gateway.clone());
        controller.toggle("tt1");
        let state = loaded(&controller).await;
        assert_eq!(state.detail, Some(detail("tt1")));
        assert_eq!(*gateway.calls.lock().unwrap(), vec!["tt1"]);
    }

    #[tokio::test]
    async fn only_latest_selection_detail_is_kept() {
        let gateway = Arc::new(GatedDetails::default());
        let first = gateway.gate("tt1");
        let second = gateway.gate("tt2");
        let controller = SelectionController::new(gateway.clone());
        controller.toggle("tt1");
        controller.toggle("tt2");

        second.send(Ok(detail("tt2"))).unwrap();
        let state = loaded(&controller).await;
        assert_eq!(state.detail, Some(detail("tt2")));

        let _ = first.send(Ok(detail("tt1")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let state = controller.detail_state();
        assert_eq!(state.selected_id.as_deref(), Some("tt2"));
        assert_eq!(state.detail, Some(detail("tt2")));
    }

    #[tokio::test]
    async fn close_discards_pending_detail() {
        let gateway = Arc::new(GatedDetails::default());
        let gate = gateway.gate("tt1");
        let controller = SelectionController::new(gateway);
        controller.toggle("tt1");
        controller.close();

        let _ = gate.send(Ok(detail("tt1")));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.detail_state(), DetailState::default());
    }

    #[tokio::test]
    async fn failed_fetch_surfaces_error() {
        let gateway = Arc::new(GatedDetails::default());
        let gate = gateway.gate("tt1");
        let controller = SelectionController::new(gateway);
        controller.toggle("tt1");
        gate.send(Err(anyhow!("Incorrect IMDb ID."))).unwrap();

        let state = loaded(&controller).await;
        assert_eq!(state.selected_id.as_deref(), Some("tt1"));
        assert_eq!(state.detail, None);
        assert_eq!(state.error.as_deref(), Some("Incorrect IMDb ID."));
    }

    #[tokio::test]
    async fn close_if_selected_leaves_newer_selection_open() {
        let controller = SelectionController::new(Arc::new(GatedDetails::default()));
        controller.toggle("tt1");
        controller.toggle("tt2");
        assert!(!controller.close_if_selected("tt1"));
        assert_eq!(controller.selected_id().as_deref(), Some("tt2"));

        assert!(controller.close_if_selected("tt2"));
        assert_eq!(controller.detail_state(), DetailState::default());
    }

    #[tokio::test]
    async fn response_for_other_id_is_discarded() {
        let gateway = Arc::new(GatedDetails::default());
        let _pending = gateway.gate("tt1");
        let controller = SelectionController::new(gateway);
        controller.toggle("tt1");

        controller.shared.settle(1, "tt9", Ok(detail("tt9")));
        let state = controller.detail_state();
        assert!(state.is_loading);
        assert_eq!(state.detail, None);
    }
}
