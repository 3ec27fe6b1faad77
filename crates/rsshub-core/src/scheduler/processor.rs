use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::feed::{parse_pub_date, Feed, FeedEntry, FeedSource, NewArticle};
use crate::storage::FeedStore;
use crate::Result;

/// What happened to the entries of one feed during a refresh
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub entries: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub bad_dates: usize,
    pub failed: usize,
}

enum EntryOutcome {
    Inserted,
    Duplicate,
    BadDate,
    Failed,
}

/// Fetch → normalize → dedupe → persist, for one feed at a time
pub struct FeedProcessor {
    store: Arc<dyn FeedStore>,
    source: Arc<dyn FeedSource>,
}

impl FeedProcessor {
    pub fn new(store: Arc<dyn FeedStore>, source: Arc<dyn FeedSource>) -> Self {
        Self { store, source }
    }

    /// Refresh one feed.
    ///
    /// Fails only when the fetch itself fails; the feed is then left
    /// unstamped so the next tick picks it up again. Entry-level problems are
    /// counted in the report and never abort the feed.
    pub async fn process(&self, feed: &Feed) -> Result<RefreshReport> {
        let entries = match self.source.fetch_entries(&feed.url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to fetch feed '{}' ({}): {}", feed.name, feed.url, e);
                if let Err(err) = self.store.record_fetch_error(feed.id, &e.to_string()).await {
                    warn!("Failed to record fetch error for '{}': {}", feed.name, err);
                }
                return Err(e);
            }
        };

        debug!("Parsed {} entries from feed '{}'", entries.len(), feed.name);

        let mut report = RefreshReport {
            entries: entries.len(),
            ..RefreshReport::default()
        };

        for entry in entries {
            match self.store_entry(feed, entry).await {
                EntryOutcome::Inserted => report.inserted += 1,
                EntryOutcome::Duplicate => report.duplicates += 1,
                EntryOutcome::BadDate => report.bad_dates += 1,
                EntryOutcome::Failed => report.failed += 1,
            }
        }

        // Stamped even when some entries failed
        if let Err(e) = self.store.mark_refreshed(feed.id).await {
            warn!("Failed to stamp refresh time of '{}': {}", feed.name, e);
        }

        info!(
            feed = %feed.name,
            inserted = report.inserted,
            duplicates = report.duplicates,
            bad_dates = report.bad_dates,
            failed = report.failed,
            "Feed refreshed"
        );

        Ok(report)
    }

    async fn store_entry(&self, feed: &Feed, entry: FeedEntry) -> EntryOutcome {
        let published_at = match parse_pub_date(&entry.raw_published) {
            Ok(date) => date,
            Err(e) => {
                warn!("Skipping entry {} of '{}': {}", entry.link, feed.name, e);
                return EntryOutcome::BadDate;
            }
        };

        match self.store.article_exists(feed.id, &entry.link).await {
            Ok(true) => {
                debug!("Article already exists: {}", entry.link);
                return EntryOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("Error checking if article {} exists: {}", entry.link, e);
                return EntryOutcome::Failed;
            }
        }

        let article = NewArticle {
            feed_id: feed.id,
            title: entry.title,
            link: entry.link,
            description: entry.description,
            published_at,
        };

        match self.store.insert_article(&article).await {
            Ok(true) => {
                debug!("Inserted article: {}", article.title);
                EntryOutcome::Inserted
            }
            // Lost a race with another insert of the same link
            Ok(false) => EntryOutcome::Duplicate,
            Err(e) => {
                warn!("Error inserting article {}: {}", article.link, e);
                EntryOutcome::Failed
            }
        }
    }
}
