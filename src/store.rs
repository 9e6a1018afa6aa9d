use crate::models::{Episode, Series, SeriesEpisodes};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Sqlite;
use tracing::debug;

pub const DEFAULT_CATEGORY: &str = "SERIES_EPISODE";

#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Most recently created series having at least one episode of `category`,
    /// with only those episodes, ordered by start time ascending.
    async fn latest_series_with_episodes(&self, category: &str) -> Result<Option<SeriesEpisodes>>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct SeriesRow {
    id: String,
    created_at_ms: i64,
}

#[derive(sqlx::FromRow)]
struct EpisodeRow {
    id: String,
    title: String,
    start_time_ms: i64,
    description: Option<String>,
}

impl TryFrom<SeriesRow> for Series {
    type Error = anyhow::Error;

    fn try_from(row: SeriesRow) -> Result<Self> {
        Ok(Series {
            created_at: millis_to_utc(row.created_at_ms)
                .with_context(|| format!("series {} has invalid created_at", row.id))?,
            id: row.id,
        })
    }
}

impl TryFrom<EpisodeRow> for Episode {
    type Error = anyhow::Error;

    fn try_from(row: EpisodeRow) -> Result<Self> {
        Ok(Episode {
            start_time: millis_to_utc(row.start_time_ms)
                .with_context(|| format!("episode {} has invalid start_time", row.id))?,
            id: row.id,
            title: row.title,
            description: row.description,
        })
    }
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("timestamp {} out of range", ms))
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self> {
        if !Sqlite::database_exists(url).await? {
            Sqlite::create_database(url)
                .await
                .with_context(|| format!("Failed to create database {}", url))?;
        }
        let pool = SqlitePool::connect(url)
            .await
            .with_context(|| format!("Failed to open database {}", url))?;
        Ok(Self { pool })
    }

    /// Single shared connection so every query sees the same in-memory database.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS series (
                id TEXT PRIMARY KEY NOT NULL,
                created_at_ms INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create series table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS episodes (
                id TEXT PRIMARY KEY NOT NULL,
                series_id TEXT NOT NULL REFERENCES series(id),
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                start_time_ms INTEGER NOT NULL,
                description TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create episodes table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_episodes_series_kind ON episodes (series_id, kind, start_time_ms)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create episodes index")?;

        Ok(())
    }
}

#[async_trait]
impl EpisodeStore for SqliteStore {
    async fn latest_series_with_episodes(&self, category: &str) -> Result<Option<SeriesEpisodes>> {
        let series: Option<SeriesRow> = sqlx::query_as(
            r#"
            SELECT s.id, s.created_at_ms
            FROM series s
            WHERE EXISTS (
                SELECT 1 FROM episodes e WHERE e.series_id = s.id AND e.kind = ?
            )
            ORDER BY s.created_at_ms DESC, s.id DESC
            LIMIT 1
            "#,
        )
        .bind(category)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query latest series")?;

        let Some(series) = series else {
            debug!(category, "No series with qualifying episodes");
            return Ok(None);
        };
        let series = Series::try_from(series)?;

        let rows: Vec<EpisodeRow> = sqlx::query_as(
            r#"
            SELECT id, title, start_time_ms, description
            FROM episodes
            WHERE series_id = ? AND kind = ?
            ORDER BY start_time_ms ASC, id ASC
            "#,
        )
        .bind(&series.id)
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query episodes of series {}", series.id))?;

        let episodes = rows
            .into_iter()
            .map(Episode::try_from)
            .collect::<Result<Vec<_>>>()?;
        debug!(series_id = %series.id, count = episodes.len(), "Loaded qualifying episodes");

        Ok(Some(SeriesEpisodes { series, episodes }))
    }
}
