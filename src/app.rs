use crate::config::Config;
use crate::models::{WatchSummary, WatchedEntry};
use crate::omdb::{OmdbApi, OmdbClient};
use crate::search::{SearchSession, SearchState};
use crate::selection::{DetailState, SelectionController};
use crate::store::{JsonFileStore, ListStore};
use crate::watchlist::{AddOutcome, WatchlistManager};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

const MAX_BODY_BYTES: usize = 16 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchSession>,
    pub selection: Arc<SelectionController>,
    pub watchlist: Arc<WatchlistManager>,
}

impl AppState {
    /// Wires the three state objects together. A query change closes the open movie.
    pub fn new(gateway: Arc<dyn OmdbApi>, store: Arc<dyn ListStore>) -> Self {
        let selection = Arc::new(SelectionController::new(gateway.clone()));
        let on_change = selection.clone();
        let search = Arc::new(SearchSession::new(gateway).on_query_change(move |_| {
            if on_change.selected_id().is_some() {
                on_change.close();
            }
        }));
        let watchlist = Arc::new(WatchlistManager::load(store));
        Self {
            search,
            selection,
            watchlist,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct RatingBody {
    pub user_rating: u8,
}

/// The open movie plus whether it is already on the watched-list.
#[derive(Debug, Serialize)]
pub struct SelectionView {
    #[serde(flatten)]
    pub state: DetailState,
    pub is_watched: bool,
    pub watched_rating: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct WatchedView {
    pub entries: Vec<WatchedEntry>,
    pub summary: WatchSummary,
}

pub async fn run_server(config: Config) -> Result<()> {
    let gateway: Arc<dyn OmdbApi> = Arc::new(OmdbClient::new(&config)?);
    let store = JsonFileStore::open(&config.data_dir)?;
    info!("Persisting watched-list under {}", store.dir().display());
    let state = AppState::new(gateway, Arc::new(store));

    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/search", get(get_search).put(put_search))
        .route("/selection", get(get_selection).delete(close_selection))
        .route("/selection/:id", post(toggle_selection))
        .route("/watched", get(get_watched).post(add_watched))
        .route("/watched/:id", delete(delete_watched))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn get_search(State(state): State<AppState>) -> Json<SearchState> {
    Json(state.search.state())
}

async fn put_search(
    State(state): State<AppState>,
    Json(body): Json<QueryBody>,
) -> Json<SearchState> {
    state.search.set_query(&body.query);
    Json(state.search.state())
}

async fn get_selection(State(state): State<AppState>) -> Json<SelectionView> {
    Json(selection_view(&state))
}

async fn toggle_selection(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<SelectionView> {
    state.selection.toggle(&id);
    Json(selection_view(&state))
}

async fn close_selection(State(state): State<AppState>) -> Json<SelectionView> {
    state.selection.close();
    Json(selection_view(&state))
}

async fn get_watched(State(state): State<AppState>) -> Json<WatchedView> {
    Json(watched_view(&state.watchlist))
}

async fn add_watched(State(state): State<AppState>, Json(body): Json<RatingBody>) -> Response {
    let Some(detail) = state.selection.detail_state().detail else {
        return error_response(StatusCode::CONFLICT, "No movie detail is loaded");
    };
    let entry = match WatchedEntry::from_detail(&detail, body.user_rating) {
        Ok(entry) => entry,
        Err(e) => return error_response(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()),
    };
    match state.watchlist.add(entry) {
        Ok(AddOutcome::Added) => {
            state.selection.close_if_selected(&detail.id);
            (StatusCode::CREATED, Json(watched_view(&state.watchlist))).into_response()
        }
        Ok(AddOutcome::AlreadyWatched) => {
            warn!(id = %detail.id, "Ignoring duplicate watched entry");
            error_response(StatusCode::CONFLICT, "Movie is already in the watched list")
        }
        Err(e) => {
            error!("Failed to add watched entry: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save watched list")
        }
    }
}

async fn delete_watched(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.watchlist.remove(&id) {
        Ok(0) => error_response(StatusCode::NOT_FOUND, "Movie is not in the watched list"),
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to remove watched entry: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save watched list")
        }
    }
}

fn selection_view(state: &AppState) -> SelectionView {
    let detail = state.selection.detail_state();
    let (is_watched, watched_rating) = match detail.selected_id.as_deref() {
        Some(id) => (
            state.watchlist.is_watched(id),
            state.watchlist.get(id).map(|e| e.user_rating),
        ),
        None => (false, None),
    };
    SelectionView {
        state: detail,
        is_watched,
        watched_rating,
    }
}

fn watched_view(watchlist: &WatchlistManager) -> WatchedView {
    WatchedView {
        entries: watchlist.entries(),
        summary: watchlist.summarize(),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "status": "error", "message": message }))).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
