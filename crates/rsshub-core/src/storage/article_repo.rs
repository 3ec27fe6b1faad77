use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use super::Database;
use crate::feed::{Article, NewArticle};
use crate::Result;

/// Repository for article operations
pub struct ArticleRepository<'a> {
    db: &'a Database,
}

#[derive(FromRow)]
struct ArticleRow {
    id: String,
    feed_id: String,
    title: String,
    link: String,
    description: Option<String>,
    published_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: Uuid::parse_str(&row.id).unwrap_or_default(),
            feed_id: Uuid::parse_str(&row.feed_id).unwrap_or_default(),
            title: row.title,
            link: row.link,
            description: row.description,
            published_at: row.published_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Whether the feed already has an article with this link
    pub async fn exists(&self, feed_id: Uuid, link: &str) -> Result<bool> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM articles WHERE feed_id = ? AND link = ?")
                .bind(feed_id.to_string())
                .bind(link)
                .fetch_one(self.db.pool())
                .await?;

        Ok(count.0 > 0)
    }

    /// Insert an article. Returns `false` when (feed_id, link) already exists.
    pub async fn insert(&self, new_article: &NewArticle) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (id, feed_id, title, link, description, published_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, link) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(new_article.feed_id.to_string())
        .bind(&new_article.title)
        .bind(&new_article.link)
        .bind(&new_article.description)
        .bind(new_article.published_at)
        .bind(Utc::now())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Latest articles of a feed by name, newest publication first
    pub async fn list_by_feed_name(&self, feed_name: &str, limit: u32) -> Result<Vec<Article>> {
        let rows: Vec<ArticleRow> = sqlx::query_as(
            r#"
            SELECT a.id, a.feed_id, a.title, a.link, a.description,
                   a.published_at, a.created_at, a.updated_at
            FROM articles a
            JOIN feeds f ON a.feed_id = f.id
            WHERE f.name = ?
            ORDER BY a.published_at DESC
            LIMIT ?
            "#,
        )
        .bind(feed_name)
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.into_iter().map(Article::from).collect())
    }

    /// Number of stored articles of a feed
    pub async fn count_by_feed(&self, feed_id: Uuid) -> Result<u32> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE feed_id = ?")
            .bind(feed_id.to_string())
            .fetch_one(self.db.pool())
            .await?;

        Ok(count.0 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::NewFeed;
    use crate::storage::FeedRepository;
    use chrono::{Duration, TimeZone};

    async fn seeded() -> (Database, Uuid) {
        let db = Database::new_in_memory().await.unwrap();
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "news".to_string(),
                url: "https://example.com/news.xml".to_string(),
            })
            .await
            .unwrap();
        (db, feed.id)
    }

    fn article(feed_id: Uuid, link: &str, published_at: DateTime<Utc>) -> NewArticle {
        NewArticle {
            feed_id,
            title: format!("Title of {}", link),
            link: link.to_string(),
            description: Some("body".to_string()),
            published_at,
        }
    }

    #[tokio::test]
    async fn test_insert_same_link_twice_keeps_one() {
        let (db, feed_id) = seeded().await;
        let repo = ArticleRepository::new(&db);
        let published = Utc.with_ymd_and_hms(2024, 8, 20, 10, 0, 0).unwrap();

        assert!(!repo.exists(feed_id, "https://example.com/a").await.unwrap());
        assert!(repo.insert(&article(feed_id, "https://example.com/a", published)).await.unwrap());
        assert!(repo.exists(feed_id, "https://example.com/a").await.unwrap());

        assert!(!repo.insert(&article(feed_id, "https://example.com/a", published)).await.unwrap());
        assert_eq!(repo.count_by_feed(feed_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_by_feed_name_newest_first() {
        let (db, feed_id) = seeded().await;
        let repo = ArticleRepository::new(&db);
        let base = Utc.with_ymd_and_hms(2024, 8, 20, 10, 0, 0).unwrap();

        for (i, link) in ["a", "b", "c", "d"].iter().enumerate() {
            repo.insert(&article(feed_id, link, base + Duration::hours(i as i64)))
                .await
                .unwrap();
        }

        let latest = repo.list_by_feed_name("news", 3).await.unwrap();
        let links: Vec<&str> = latest.iter().map(|a| a.link.as_str()).collect();
        assert_eq!(links, vec!["d", "c", "b"]);
        assert!(repo.list_by_feed_name("other", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_feed_delete_cascades() {
        let (db, feed_id) = seeded().await;
        let repo = ArticleRepository::new(&db);
        repo.insert(&article(feed_id, "x", Utc::now())).await.unwrap();

        FeedRepository::new(&db).delete_by_name("news").await.unwrap();
        assert_eq!(repo.count_by_feed(feed_id).await.unwrap(), 0);
    }
}
