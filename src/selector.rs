use crate::models::{NearestEpisode, ValidationError};
use crate::store::EpisodeStore;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

pub const NOT_FOUND_MESSAGE: &str = "No series with episodes found";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("no series with qualifying episodes")]
    NotFound,
    #[error("store failure: {0:#}")]
    Store(#[from] anyhow::Error),
    #[error("invalid response: {0}")]
    Invalid(#[from] ValidationError),
}

impl SelectorError {
    pub fn status(&self) -> StatusCode {
        match self {
            SelectorError::NotFound => StatusCode::NOT_FOUND,
            SelectorError::Store(_) | SelectorError::Invalid(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for SelectorError {
    fn into_response(self) -> Response {
        let message = match &self {
            SelectorError::NotFound => NOT_FOUND_MESSAGE,
            other => {
                error!("Error fetching nearest episode: {}", other);
                INTERNAL_ERROR_MESSAGE
            }
        };
        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

/// Keyed minimum over `items`; the first of several equal keys wins.
pub fn nearest_by<T, K, F>(items: &[T], mut key: F) -> Option<&T>
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    let mut iter = items.iter();
    let first = iter.next()?;
    let mut best = (first, key(first));
    for item in iter {
        let k = key(item);
        if k < best.1 {
            best = (item, k);
        }
    }
    Some(best.0)
}

fn distance_ms(start: &DateTime<Utc>, now: &DateTime<Utc>) -> u64 {
    start.signed_duration_since(*now).num_milliseconds().unsigned_abs()
}

pub async fn nearest_episode(
    store: &dyn EpisodeStore,
    category: &str,
    now: DateTime<Utc>,
) -> Result<NearestEpisode, SelectorError> {
    let Some(found) = store.latest_series_with_episodes(category).await? else {
        return Err(SelectorError::NotFound);
    };

    let nearest = nearest_by(&found.episodes, |e| distance_ms(&e.start_time, &now))
        .ok_or(SelectorError::NotFound)?;
    debug!(
        series_id = %found.series.id,
        episode_id = %nearest.id,
        candidates = found.episodes.len(),
        "Selected nearest episode"
    );

    let response = NearestEpisode::from_episode(nearest);
    response.validate()?;
    Ok(response)
}
