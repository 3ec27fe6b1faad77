//! Engine lifecycle
//!
//! [`Aggregator`] holds the settings of a stopped engine. [`Aggregator::start`]
//! claims the control socket, spawns the worker pool, the scheduler and the
//! control server, and hands back a [`RunningAggregator`]. Stopping consumes
//! that handle, so an engine is stopped at most once per start.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::control::{remove_socket, ControlServer};
use crate::duration::format_duration;
use crate::feed::FeedSource;
use crate::scheduler::{EngineHandle, FeedProcessor, Resized, Scheduler, SharedPool, WorkerPool};
use crate::storage::FeedStore;
use crate::{Error, Result};

pub struct Aggregator {
    store: Arc<dyn FeedStore>,
    source: Arc<dyn FeedSource>,
    interval: Duration,
    workers: usize,
    socket_path: PathBuf,
}

impl Aggregator {
    pub fn new(
        store: Arc<dyn FeedStore>,
        source: Arc<dyn FeedSource>,
        interval: Duration,
        workers: usize,
        socket_path: PathBuf,
    ) -> Self {
        Self {
            store,
            source,
            interval,
            workers,
            socket_path,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn FeedStore>,
        source: Arc<dyn FeedSource>,
    ) -> Result<Self> {
        Ok(Self::new(
            store,
            source,
            config.interval()?,
            config.aggregator.workers,
            config.socket_path(),
        ))
    }

    /// Start the engine.
    ///
    /// The control socket is claimed before anything is spawned, so a second
    /// instance fails with [`Error::AlreadyRunning`] and leaves nothing behind.
    pub async fn start(self) -> Result<RunningAggregator> {
        if self.workers < 1 {
            return Err(Error::InvalidSize(self.workers as i64));
        }
        if self.interval.is_zero() {
            return Err(Error::InvalidDuration(format_duration(self.interval)));
        }

        let server = ControlServer::bind(&self.socket_path).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        // Bounded by the initial worker count; later resizes keep the capacity
        let (queue_tx, queue_rx) = mpsc::channel(self.workers);

        let processor = Arc::new(FeedProcessor::new(self.store.clone(), self.source));
        let pool: SharedPool = Arc::new(Mutex::new(WorkerPool::spawn(
            self.workers,
            queue_rx,
            processor,
            shutdown_rx.clone(),
        )?));

        let (period_tx, period_rx) = watch::channel(self.interval);
        let engine = EngineHandle::new(pool.clone(), Arc::new(period_tx));

        let scheduler = Scheduler::new(
            self.store,
            pool.clone(),
            queue_tx,
            period_rx,
            shutdown_rx.clone(),
        );
        let scheduler_task = tokio::spawn(scheduler.run());
        let server_task = tokio::spawn(server.serve(engine.clone(), shutdown_rx));

        info!(
            "Aggregator started (interval = {}, workers = {})",
            format_duration(self.interval),
            self.workers
        );

        Ok(RunningAggregator {
            engine,
            pool,
            shutdown: shutdown_tx,
            scheduler_task,
            server_task,
            socket_path: self.socket_path,
        })
    }
}

pub struct RunningAggregator {
    engine: EngineHandle,
    pool: SharedPool,
    shutdown: watch::Sender<bool>,
    scheduler_task: JoinHandle<()>,
    server_task: JoinHandle<()>,
    socket_path: PathBuf,
}

impl RunningAggregator {
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn interval(&self) -> Duration {
        self.engine.interval()
    }

    pub async fn worker_count(&self) -> usize {
        self.engine.worker_count().await
    }

    pub fn set_interval(&self, period: Duration) -> Result<Duration> {
        self.engine.set_interval(period)
    }

    pub async fn resize(&self, count: i64) -> Result<Resized> {
        self.engine.resize(count).await
    }

    /// Stop the engine and wait until every task has exited. Workers finish
    /// the feed they hold first.
    pub async fn stop(self) {
        info!("Stopping aggregator");
        self.shutdown.send_replace(true);

        // Scheduler exit drops the only queue sender
        if let Err(e) = self.scheduler_task.await {
            warn!("Scheduler task failed: {}", e);
        }

        self.pool.lock().await.shutdown().await;

        if let Err(e) = self.server_task.await {
            warn!("Control server task failed: {}", e);
        }
        remove_socket(&self.socket_path);

        info!("Aggregator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlClient;
    use crate::feed::NewFeed;
    use crate::storage::{ArticleRepository, Database, FeedRepository};
    use crate::testing::{entry, MemoryStore, StubSource};
    use std::sync::atomic::Ordering;
    use tokio::time::{sleep, timeout};

    fn socket_in(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("rsshub.sock")
    }

    #[tokio::test]
    async fn test_refreshes_feed_into_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let feed = FeedRepository::new(&db)
            .create(&NewFeed {
                name: "news".to_string(),
                url: "https://example.com/news.xml".to_string(),
            })
            .await
            .unwrap();

        let source = Arc::new(StubSource::default());
        source.serve(
            &feed.url,
            vec![
                entry("https://example.com/1", "Mon, 02 Jan 2006 15:04:05 MST"),
                entry("https://example.com/2", "2006-01-02T15:04:05+07:00"),
                entry("https://example.com/3", "not a date"),
            ],
        );

        let running = Aggregator::new(
            db.clone(),
            source.clone(),
            Duration::from_millis(200),
            2,
            socket_in(&dir),
        )
        .start()
        .await
        .unwrap();

        timeout(Duration::from_secs(5), async {
            loop {
                let refreshed = FeedRepository::new(&db)
                    .find_by_id(feed.id)
                    .await
                    .unwrap()
                    .and_then(|f| f.last_refreshed_at);
                if refreshed.is_some() {
                    break;
                }
                sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("feed was never refreshed");

        running.stop().await;

        assert_eq!(ArticleRepository::new(&db).count_by_feed(feed.id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_second_instance_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let source = Arc::new(StubSource::default());

        let first = Aggregator::new(store.clone(), source.clone(), Duration::from_secs(60), 1, socket_in(&dir))
            .start()
            .await
            .unwrap();
        let second = Aggregator::new(store, source, Duration::from_secs(60), 1, socket_in(&dir))
            .start()
            .await;

        assert!(matches!(second, Err(Error::AlreadyRunning(_))));
        first.stop().await;
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let source = Arc::new(StubSource::default());

        let no_workers = Aggregator::new(store.clone(), source.clone(), Duration::from_secs(1), 0, socket_in(&dir))
            .start()
            .await;
        assert!(matches!(no_workers, Err(Error::InvalidSize(0))));

        let no_period = Aggregator::new(store, source, Duration::ZERO, 1, socket_in(&dir))
            .start()
            .await;
        assert!(matches!(no_period, Err(Error::InvalidDuration(_))));
        assert!(!socket_in(&dir).exists());
    }

    #[tokio::test]
    async fn test_control_commands_reach_running_engine() {
        let dir = tempfile::tempdir().unwrap();
        let running = Aggregator::new(
            Arc::new(MemoryStore::default()),
            Arc::new(StubSource::default()),
            Duration::from_secs(180),
            3,
            socket_in(&dir),
        )
        .start()
        .await
        .unwrap();
        let client = ControlClient::new(running.socket_path().to_path_buf());

        assert_eq!(client.set_workers("abc").await.unwrap(), "Invalid count");
        assert_eq!(running.worker_count().await, 3);

        assert_eq!(
            client.set_workers("5").await.unwrap(),
            "Number of workers changed from 3 to 5"
        );
        assert_eq!(running.worker_count().await, 5);

        assert_eq!(
            client.set_interval("2m").await.unwrap(),
            "Interval of fetching feeds changed from 3m0s to 2m0s"
        );
        assert_eq!(running.interval(), Duration::from_secs(120));

        assert_eq!(client.set_interval("whenever").await.unwrap(), "Invalid duration");
        assert_eq!(running.interval(), Duration::from_secs(120));

        running.stop().await;
    }

    #[tokio::test]
    async fn test_in_process_controls() {
        let dir = tempfile::tempdir().unwrap();
        let running = Aggregator::new(
            Arc::new(MemoryStore::default()),
            Arc::new(StubSource::default()),
            Duration::from_secs(60),
            2,
            socket_in(&dir),
        )
        .start()
        .await
        .unwrap();

        assert_eq!(running.set_interval(Duration::from_secs(30)).unwrap(), Duration::from_secs(60));
        assert!(matches!(running.set_interval(Duration::ZERO), Err(Error::InvalidDuration(_))));
        assert_eq!(running.interval(), Duration::from_secs(30));

        assert_eq!(running.resize(1).await.unwrap(), Resized { old: 2, new: 1 });
        assert!(matches!(running.resize(0).await, Err(Error::InvalidSize(0))));
        assert_eq!(running.worker_count().await, 1);

        running.stop().await;
    }

    #[tokio::test]
    async fn test_stop_waits_for_in_flight_feeds() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::default());
        let source = Arc::new(StubSource::with_delay(Duration::from_millis(300)));
        for name in ["a", "b", "c", "d"] {
            let feed = store.add_feed(name, None);
            source.serve(&feed.url, vec![entry(&format!("{}/1", feed.url), "2024-08-21T08:00:00Z")]);
        }

        let path = socket_in(&dir);
        let running = Aggregator::new(store.clone(), source.clone(), Duration::from_millis(100), 2, path.clone())
            .start()
            .await
            .unwrap();

        timeout(Duration::from_secs(5), async {
            while source.started.load(Ordering::SeqCst) < 2 {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("workers never picked up feeds");

        running.stop().await;

        let started = source.started.load(Ordering::SeqCst);
        assert_eq!(source.finished.load(Ordering::SeqCst), started);
        assert!(!path.exists());

        // Nothing runs after stop returns
        sleep(Duration::from_millis(400)).await;
        assert_eq!(source.started.load(Ordering::SeqCst), started);
    }
}
