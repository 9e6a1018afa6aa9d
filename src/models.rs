use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub start_time: DateTime<Utc>,
    /// Trusted markup, rendered as-is by the card.
    pub description: Option<String>,
}

/// A series together with its qualifying episodes, ordered by start time.
#[derive(Debug, Clone)]
pub struct SeriesEpisodes {
    pub series: Series,
    pub episodes: Vec<Episode>,
}

/// Wire shape of `GET /api/nearest-episode`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearestEpisode {
    pub episode_id: String,
    pub title: String,
    pub start_time: String,
    pub description: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("episodeId must not be empty")]
    EmptyEpisodeId,
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("startTime '{0}' is not a canonical ISO-8601 UTC instant")]
    StartTime(String),
}

impl NearestEpisode {
    pub fn from_episode(episode: &Episode) -> Self {
        Self {
            episode_id: episode.id.clone(),
            title: episode.title.clone(),
            start_time: format_start_time(&episode.start_time),
            description: episode
                .description
                .as_ref()
                .filter(|d| !d.is_empty())
                .cloned(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.episode_id.is_empty() {
            return Err(ValidationError::EmptyEpisodeId);
        }
        if self.title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        match parse_start_time(&self.start_time) {
            Some(parsed) if format_start_time(&parsed) == self.start_time => Ok(()),
            _ => Err(ValidationError::StartTime(self.start_time.clone())),
        }
    }
}

/// `YYYY-MM-DDTHH:mm:ss.sssZ`
pub fn format_start_time(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_start_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
