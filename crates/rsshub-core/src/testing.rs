//! In-memory collaborators for engine tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::feed::{Feed, FeedEntry, FeedSource, NewArticle};
use crate::storage::FeedStore;
use crate::{Error, Result};

#[derive(Default)]
struct StoreState {
    feeds: Vec<Feed>,
    articles: Vec<NewArticle>,
}

/// A `FeedStore` backed by vectors
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    fail_outdated: AtomicBool,
    pub outdated_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn add_feed(&self, name: &str, last_refreshed_at: Option<DateTime<Utc>>) -> Feed {
        let feed = Feed {
            id: Uuid::new_v4(),
            name: name.to_string(),
            url: format!("https://example.com/{}.xml", name),
            created_at: Utc::now(),
            last_refreshed_at,
            fetch_error: None,
        };
        self.state.lock().unwrap().feeds.push(feed.clone());
        feed
    }

    pub fn feed(&self, id: Uuid) -> Option<Feed> {
        self.state.lock().unwrap().feeds.iter().find(|f| f.id == id).cloned()
    }

    pub fn articles_for(&self, feed_id: Uuid) -> Vec<NewArticle> {
        self.state
            .lock()
            .unwrap()
            .articles
            .iter()
            .filter(|a| a.feed_id == feed_id)
            .cloned()
            .collect()
    }

    pub fn fail_outdated(&self, fail: bool) {
        self.fail_outdated.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl FeedStore for MemoryStore {
    async fn outdated_feeds(&self, limit: usize) -> Result<Vec<Feed>> {
        self.outdated_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_outdated.load(Ordering::SeqCst) {
            return Err(Error::Other("store unavailable".to_string()));
        }

        let mut feeds = self.state.lock().unwrap().feeds.clone();
        // Stable sort keeps insertion order among equals; None sorts first
        feeds.sort_by_key(|f| f.last_refreshed_at);
        feeds.truncate(limit);
        Ok(feeds)
    }

    async fn article_exists(&self, feed_id: Uuid, link: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .articles
            .iter()
            .any(|a| a.feed_id == feed_id && a.link == link))
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state
            .articles
            .iter()
            .any(|a| a.feed_id == article.feed_id && a.link == article.link)
        {
            return Ok(false);
        }
        state.articles.push(article.clone());
        Ok(true)
    }

    async fn mark_refreshed(&self, feed_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(feed) = state.feeds.iter_mut().find(|f| f.id == feed_id) {
            feed.last_refreshed_at = Some(Utc::now());
            feed.fetch_error = None;
        }
        Ok(())
    }

    async fn record_fetch_error(&self, feed_id: Uuid, error: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(feed) = state.feeds.iter_mut().find(|f| f.id == feed_id) {
            feed.fetch_error = Some(error.to_string());
        }
        Ok(())
    }
}

/// A `FeedSource` serving canned entries per URL, optionally slowly
#[derive(Default)]
pub struct StubSource {
    responses: Mutex<HashMap<String, Vec<FeedEntry>>>,
    delay: Duration,
    pub started: AtomicUsize,
    pub finished: AtomicUsize,
}

impl StubSource {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Serve `entries` for `url`; unknown URLs fail to fetch
    pub fn serve(&self, url: &str, entries: Vec<FeedEntry>) {
        self.responses.lock().unwrap().insert(url.to_string(), entries);
    }
}

#[async_trait]
impl FeedSource for StubSource {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<FeedEntry>> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let response = self.responses.lock().unwrap().get(url).cloned();
        self.finished.fetch_add(1, Ordering::SeqCst);
        response.ok_or_else(|| Error::FeedParse(format!("HTTP 404 for URL: {}", url)))
    }
}

pub fn entry(link: &str, raw_published: &str) -> FeedEntry {
    FeedEntry {
        title: format!("Entry {}", link),
        link: link.to_string(),
        description: None,
        raw_published: raw_published.to_string(),
    }
}
