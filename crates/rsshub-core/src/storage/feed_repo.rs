use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::feed::{Feed, NewFeed};
use crate::{Error, Result};

/// Repository for feed CRUD operations
pub struct FeedRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct FeedRow {
    id: String,
    name: String,
    url: String,
    created_at: DateTime<Utc>,
    last_refreshed_at: Option<DateTime<Utc>>,
    fetch_error: Option<String>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            name: row.name,
            url: row.url,
            created_at: row.created_at,
            last_refreshed_at: row.last_refreshed_at,
            fetch_error: row.fetch_error,
        }
    }
}

impl<'a> FeedRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create a new feed; the name must be unused
    pub async fn create(&self, new_feed: &NewFeed) -> Result<Feed> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&new_feed.name)
        .bind(&new_feed.url)
        .bind(now)
        .execute(self.db.pool())
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| Error::FeedNotFound(id.to_string()))
    }

    /// Find a feed by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, last_refreshed_at, fetch_error
            FROM feeds
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Feed::from))
    }

    /// Find a feed by its unique name
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Feed>> {
        let row: Option<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, last_refreshed_at, fetch_error
            FROM feeds
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(Feed::from))
    }

    /// List feeds, newest first; `None` lists all of them
    pub async fn list(&self, limit: Option<u32>) -> Result<Vec<Feed>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(i64::from).unwrap_or(-1);

        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, last_refreshed_at, fetch_error
            FROM feeds
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Feeds most in need of a refresh: never refreshed first, then oldest
    pub async fn list_outdated(&self, limit: usize) -> Result<Vec<Feed>> {
        let rows: Vec<FeedRow> = sqlx::query_as(
            r#"
            SELECT id, name, url, created_at, last_refreshed_at, fetch_error
            FROM feeds
            ORDER BY last_refreshed_at IS NOT NULL, last_refreshed_at ASC, created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Feed::from).collect())
    }

    /// Stamp the end of a fetch cycle and clear any previous fetch error
    pub async fn mark_refreshed(&self, id: Uuid) -> Result<()> {
        self.mark_refreshed_at(id, Utc::now()).await
    }

    pub async fn mark_refreshed_at(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE feeds
            SET last_refreshed_at = ?,
                fetch_error = NULL
            WHERE id = ?
            "#,
        )
        .bind(at)
        .bind(id.to_string())
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    /// Remember why the last fetch failed, leaving the refresh time alone
    pub async fn record_fetch_error(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query("UPDATE feeds SET fetch_error = ? WHERE id = ?")
            .bind(error)
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    /// Delete a feed and all its articles
    pub async fn delete_by_name(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feeds WHERE name = ?")
            .bind(name)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get total feed count
    pub async fn count(&self) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}
