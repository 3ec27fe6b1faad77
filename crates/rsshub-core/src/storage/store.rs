use async_trait::async_trait;
use uuid::Uuid;

use super::{ArticleRepository, Database, FeedRepository};
use crate::feed::{Feed, NewArticle};
use crate::Result;

/// The slice of persistence the scheduler and workers need.
///
/// Implemented by [`Database`]; engine tests swap in an in-memory double.
#[async_trait]
pub trait FeedStore: Send + Sync + 'static {
    /// Up to `limit` feeds, never-refreshed first, then oldest refresh first
    async fn outdated_feeds(&self, limit: usize) -> Result<Vec<Feed>>;

    async fn article_exists(&self, feed_id: Uuid, link: &str) -> Result<bool>;

    /// Returns `false` if the (feed, link) pair was already stored
    async fn insert_article(&self, article: &NewArticle) -> Result<bool>;

    async fn mark_refreshed(&self, feed_id: Uuid) -> Result<()>;

    async fn record_fetch_error(&self, feed_id: Uuid, error: &str) -> Result<()>;
}

#[async_trait]
impl FeedStore for Database {
    async fn outdated_feeds(&self, limit: usize) -> Result<Vec<Feed>> {
        FeedRepository::new(self).list_outdated(limit).await
    }

    async fn article_exists(&self, feed_id: Uuid, link: &str) -> Result<bool> {
        ArticleRepository::new(self).exists(feed_id, link).await
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<bool> {
        ArticleRepository::new(self).insert(article).await
    }

    async fn mark_refreshed(&self, feed_id: Uuid) -> Result<()> {
        FeedRepository::new(self).mark_refreshed(feed_id).await
    }

    async fn record_fetch_error(&self, feed_id: Uuid, error: &str) -> Result<()> {
        FeedRepository::new(self).record_fetch_error(feed_id, error).await
    }
}
