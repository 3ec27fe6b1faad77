use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named syndication source tracked by the aggregator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
    /// When the last fetch cycle finished; `None` until the first one
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub fetch_error: Option<String>,
}

/// Data required to create a new feed
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub name: String,
    pub url: String,
}

/// A stored entry of a feed, unique per (feed, link)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: Uuid,
    pub feed_id: Uuid,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Data required to create a new article
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub feed_id: Uuid,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}

/// One entry as it came out of the feed document, before date normalization
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub raw_published: String,
}

impl Feed {
    /// Check if the last fetch of this feed failed
    pub fn has_error(&self) -> bool {
        self.fetch_error.is_some()
    }
}
