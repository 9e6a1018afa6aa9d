use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use episode_viewer::app::{build_router, AppState};
use episode_viewer::models::{parse_start_time, format_start_time, SeriesEpisodes};
use episode_viewer::store::{EpisodeStore, SqliteStore, DEFAULT_CATEGORY};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

struct UnavailableStore;

#[async_trait::async_trait]
impl EpisodeStore for UnavailableStore {
    async fn latest_series_with_episodes(
        &self,
        _category: &str,
    ) -> anyhow::Result<Option<SeriesEpisodes>> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

async fn empty_store() -> SqliteStore {
    let store = SqliteStore::connect_in_memory().await.unwrap();
    store.ensure_schema().await.unwrap();
    store
}

async fn add_series(store: &SqliteStore, id: &str, created_at: DateTime<Utc>) {
    sqlx::query("INSERT INTO series (id, created_at_ms) VALUES (?, ?)")
        .bind(id)
        .bind(created_at.timestamp_millis())
        .execute(store.pool())
        .await
        .unwrap();
}

async fn add_episode(
    store: &SqliteStore,
    id: &str,
    series_id: &str,
    kind: &str,
    start: DateTime<Utc>,
    description: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO episodes (id, series_id, kind, title, start_time_ms, description) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(series_id)
    .bind(kind)
    .bind(format!("Episode {}", id))
    .bind(start.timestamp_millis())
    .bind(description)
    .execute(store.pool())
    .await
    .unwrap();
}

fn app(store: impl EpisodeStore + 'static) -> Router {
    build_router(AppState {
        store: Arc::new(store),
        category: DEFAULT_CATEGORY.to_string(),
    })
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let res = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let content_type = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn returns_nearest_episode_of_latest_series() {
    let now = Utc::now();
    let store = empty_store().await;
    add_series(&store, "older", now - Duration::days(10)).await;
    add_series(&store, "latest", now - Duration::days(1)).await;
    add_episode(&store, "old-1", "older", DEFAULT_CATEGORY, now, Some("old")).await;
    add_episode(
        &store,
        "past",
        "latest",
        DEFAULT_CATEGORY,
        now - Duration::hours(3),
        Some("<p>Past</p>"),
    )
    .await;
    add_episode(
        &store,
        "soon",
        "latest",
        DEFAULT_CATEGORY,
        now + Duration::hours(1),
        Some("<p>Soon</p>"),
    )
    .await;
    add_episode(&store, "other-kind", "latest", "TRAILER", now, None).await;

    let (status, content_type, body) = get(app(store), "/api/nearest-episode").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().contains("application/json"));

    let data: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(data["episodeId"], "soon");
    assert_eq!(data["title"], "Episode soon");
    assert_eq!(data["description"], "<p>Soon</p>");

    let start_time = data["startTime"].as_str().unwrap();
    let expected = (now + Duration::hours(1)).timestamp_millis();
    assert_eq!(
        parse_start_time(start_time).unwrap().timestamp_millis(),
        expected
    );
    assert_eq!(format_start_time(&parse_start_time(start_time).unwrap()), start_time);
    assert_eq!(start_time.len(), "2025-06-16T01:00:00.000Z".len());
    assert!(start_time.ends_with('Z'));
}

#[tokio::test]
async fn missing_description_is_null() {
    let now = Utc::now();
    let store = empty_store().await;
    add_series(&store, "s", now).await;
    add_episode(&store, "e", "s", DEFAULT_CATEGORY, now, None).await;

    let (status, _, body) = get(app(store), "/api/nearest-episode").await;
    assert_eq!(status, StatusCode::OK);
    let data: Value = serde_json::from_str(&body).unwrap();
    assert!(data.get("description").unwrap().is_null());
}

#[tokio::test]
async fn not_found_when_no_series_exists() {
    let (status, _, body) = get(app(empty_store().await), "/api/nearest-episode").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"No series with episodes found"}"#);
}

#[tokio::test]
async fn not_found_when_latest_series_has_only_other_kinds() {
    let now = Utc::now();
    let store = empty_store().await;
    add_series(&store, "s", now).await;
    add_episode(&store, "t", "s", "TRAILER", now, None).await;

    let (status, _, body) = get(app(store), "/api/nearest-episode").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"No series with episodes found"}"#);
}

#[tokio::test]
async fn store_failure_is_internal_error() {
    let (status, content_type, body) = get(app(UnavailableStore), "/api/nearest-episode").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(content_type.unwrap().contains("application/json"));
    assert_eq!(body, r#"{"error":"Internal server error"}"#);
}

#[tokio::test]
async fn page_renders_ready_card() {
    let now = Utc::now();
    let store = empty_store().await;
    add_series(&store, "s", now).await;
    add_episode(
        &store,
        "e",
        "s",
        DEFAULT_CATEGORY,
        now + Duration::minutes(5),
        Some("<p>Tonight <em>live</em></p>"),
    )
    .await;

    let (status, content_type, body) = get(app(store), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(body.contains("<h1>Series Episode Viewer</h1>"));
    assert!(body.contains("<h3>Episode e</h3>"));
    assert!(body.contains("<time datetime="));
    assert!(body.contains("<p>Tonight <em>live</em></p>"));
}

#[tokio::test]
async fn page_renders_empty_card_for_missing_data() {
    let (status, _, body) = get(app(empty_store().await), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No Episode Found"));
    assert!(body.contains("No upcoming episodes available at the moment."));
}

#[tokio::test]
async fn page_renders_server_error_card() {
    let (status, _, body) = get(app(UnavailableStore), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Error Loading Episode"));
    assert!(body.contains("Server error occurred. Please try again later."));
    assert!(body.contains("Try Again"));
}

#[tokio::test]
async fn health_is_ok() {
    let (status, _, body) = get(app(UnavailableStore), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}
