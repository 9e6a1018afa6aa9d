use crate::card::{render_page, ViewState};
use crate::config::Config;
use crate::models::NearestEpisode;
use crate::selector::{self, SelectorError};
use crate::store::{EpisodeStore, SqliteStore};
use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Local, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EpisodeStore>,
    pub category: String,
}

pub async fn run_server(config: Config) -> Result<()> {
    let store = SqliteStore::connect(&config.database_url).await?;
    store.ensure_schema().await?;
    info!("Using episode category: {}", config.category);

    let state = AppState {
        store: Arc::new(store),
        category: config.category,
    };
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
        .route("/", get(home))
        .route("/api/nearest-episode", get(nearest_episode))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn select(state: &AppState) -> Result<NearestEpisode, SelectorError> {
    selector::nearest_episode(state.store.as_ref(), &state.category, Utc::now()).await
}

async fn nearest_episode(
    State(state): State<AppState>,
) -> Result<Json<NearestEpisode>, SelectorError> {
    let episode = select(&state).await?;
    info!("Serving nearest episode {}", episode.episode_id);
    Ok(Json(episode))
}

async fn home(State(state): State<AppState>) -> Response {
    let outcome = select(&state).await;
    if let Err(e) = &outcome {
        if e.status().is_server_error() {
            error!("Error fetching nearest episode: {}", e);
        }
    }
    match render_page(&ViewState::from_selection(outcome), &Local) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to render page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        term.recv().await;
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
