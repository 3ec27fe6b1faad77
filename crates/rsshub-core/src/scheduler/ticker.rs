use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::pool::SharedPool;
use crate::duration::format_duration;
use crate::feed::Feed;
use crate::storage::FeedStore;

/// Periodic producer feeding the work queue with the most overdue feeds
pub struct Scheduler {
    store: Arc<dyn FeedStore>,
    pool: SharedPool,
    queue: mpsc::Sender<Feed>,
    period: watch::Receiver<Duration>,
    shutdown: watch::Receiver<bool>,
}

/// The first tick is one full period after `now`
fn timer(period: Duration) -> Interval {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn FeedStore>,
        pool: SharedPool,
        queue: mpsc::Sender<Feed>,
        period: watch::Receiver<Duration>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            pool,
            queue,
            period,
            shutdown,
        }
    }

    /// Tick until shutdown. Dropping `self` on return closes the work queue.
    pub async fn run(mut self) {
        let mut period = *self.period.borrow_and_update();
        let mut ticks = timer(period);

        info!("Scheduler started with period {}", format_duration(period));

        loop {
            tokio::select! {
                result = self.shutdown.changed() => {
                    if result.is_err() || *self.shutdown.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                result = self.period.changed() => {
                    if result.is_err() {
                        warn!("Period sender dropped, stopping scheduler");
                        break;
                    }
                    let new_period = *self.period.borrow_and_update();
                    // Phase restarts from the moment of the change
                    ticks = timer(new_period);
                    info!(
                        "Scheduler period changed from {} to {}",
                        format_duration(period),
                        format_duration(new_period)
                    );
                    period = new_period;
                }

                _ = ticks.tick() => {
                    if self.tick().await.is_none() {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// Enqueue up to one feed per active worker.
    ///
    /// Returns the number of feeds enqueued, or `None` when shutdown (or a
    /// closed queue) interrupted the tick.
    pub async fn tick(&mut self) -> Option<usize> {
        let limit = self.pool.lock().await.size();

        let feeds = match self.store.outdated_feeds(limit).await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!("Error getting outdated feeds: {}", e);
                return Some(0);
            }
        };

        debug!("Tick: {} outdated feeds for {} workers", feeds.len(), limit);

        let mut queued = 0;
        for feed in feeds {
            tokio::select! {
                sent = self.queue.send(feed) => {
                    if sent.is_err() {
                        warn!("Work queue closed");
                        return None;
                    }
                    queued += 1;
                }
                _ = self.shutdown.changed() => return None,
            }
        }

        Some(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{FeedProcessor, WorkerPool};
    use crate::testing::{MemoryStore, StubSource};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::atomic::Ordering;
    use tokio::sync::Mutex;

    /// Scheduler whose queue is observable; the pool's own runners wait on a
    /// separate queue that never receives anything.
    struct Harness {
        scheduler: Scheduler,
        queued: mpsc::Receiver<Feed>,
        store: Arc<MemoryStore>,
        period: watch::Sender<Duration>,
        _idle_queue: mpsc::Sender<Feed>,
        _shutdown: watch::Sender<bool>,
    }

    fn harness(workers: usize, period: Duration) -> Harness {
        let store = Arc::new(MemoryStore::default());
        let source = Arc::new(StubSource::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (idle_tx, idle_rx) = mpsc::channel(1);
        let processor = Arc::new(FeedProcessor::new(store.clone(), source));
        let pool = WorkerPool::spawn(workers, idle_rx, processor, shutdown_rx.clone()).unwrap();

        let (queue_tx, queue_rx) = mpsc::channel(64);
        let (period_tx, period_rx) = watch::channel(period);
        let scheduler = Scheduler::new(
            store.clone(),
            Arc::new(Mutex::new(pool)),
            queue_tx,
            period_rx,
            shutdown_rx,
        );

        Harness {
            scheduler,
            queued: queue_rx,
            store,
            period: period_tx,
            _idle_queue: idle_tx,
            _shutdown: shutdown_tx,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<Feed>) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(feed) = rx.try_recv() {
            names.push(feed.name);
        }
        names
    }

    #[tokio::test]
    async fn test_tick_enqueues_at_most_one_feed_per_worker() {
        for (feeds, workers) in [(0, 3), (2, 3), (3, 3), (5, 3), (5, 1)] {
            let mut h = harness(workers, Duration::from_secs(60));
            for i in 0..feeds {
                h.store.add_feed(&format!("feed-{}", i), None);
            }

            let queued = h.scheduler.tick().await;

            assert_eq!(queued, Some(feeds.min(workers)));
            assert_eq!(drain(&mut h.queued).len(), feeds.min(workers));
        }
    }

    #[tokio::test]
    async fn test_tick_takes_most_overdue_first() {
        let mut h = harness(3, Duration::from_secs(60));
        let now = Utc::now();
        h.store.add_feed("fresh", Some(now));
        h.store.add_feed("stale", Some(now - ChronoDuration::hours(5)));
        h.store.add_feed("never", None);
        h.store.add_feed("older", Some(now - ChronoDuration::hours(1)));

        h.scheduler.tick().await;

        assert_eq!(drain(&mut h.queued), vec!["never", "stale", "older"]);
    }

    #[tokio::test]
    async fn test_tick_skips_when_store_fails() {
        let mut h = harness(2, Duration::from_secs(60));
        h.store.add_feed("a", None);
        h.store.fail_outdated(true);

        assert_eq!(h.scheduler.tick().await, Some(0));
        assert!(drain(&mut h.queued).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let h = harness(1, Duration::from_secs(10));
        let store = h.store.clone();
        let task = tokio::spawn(h.scheduler.run());

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(store.outdated_calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.outdated_calls.load(Ordering::SeqCst), 1);

        // A failing store does not stop the loop
        store.fail_outdated(true);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(store.outdated_calls.load(Ordering::SeqCst), 2);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_period_change_restarts_phase() {
        let h = harness(1, Duration::from_secs(10));
        let store = h.store.clone();
        let period = h.period;
        let task = tokio::spawn(h.scheduler.run());

        tokio::time::sleep(Duration::from_secs(8)).await;
        let old = period.send_replace(Duration::from_secs(5));
        assert_eq!(old, Duration::from_secs(10));

        // The old phase would have fired at t=10
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(store.outdated_calls.load(Ordering::SeqCst), 0);

        // First tick under the new period lands at t=13
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.outdated_calls.load(Ordering::SeqCst), 1);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop_and_closes_queue() {
        let h = harness(1, Duration::from_secs(10));
        let mut queued = h.queued;
        let shutdown = h._shutdown;
        let task = tokio::spawn(h.scheduler.run());

        shutdown.send_replace(true);
        task.await.unwrap();

        assert!(queued.recv().await.is_none());
    }
}
