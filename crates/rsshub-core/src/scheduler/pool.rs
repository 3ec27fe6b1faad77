//! Resizable worker pool
//!
//! [`WorkerPool`] is the single owner of every runner and its stop signal.
//! Callers share it behind one mutex (see [`SharedPool`]), which serializes
//! resizes against each other and against the scheduler reading the size.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::processor::FeedProcessor;
use crate::feed::Feed;
use crate::{Error, Result};

/// Receiving end of the work queue, shared by all runners
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<Feed>>>;

/// The pool as shared between the scheduler, control handlers and shutdown
pub type SharedPool = Arc<Mutex<WorkerPool>>;

/// Old and new worker counts after a successful resize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resized {
    pub old: usize,
    pub new: usize,
}

struct Worker {
    id: usize,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct WorkerPool {
    queue: SharedQueue,
    processor: Arc<FeedProcessor>,
    shutdown: watch::Receiver<bool>,
    workers: Vec<Worker>,
    /// Runners told to stop that may still be finishing a feed
    retiring: Vec<JoinHandle<()>>,
    next_id: usize,
    closed: bool,
}

impl WorkerPool {
    /// Start `size` runners draining `queue`
    pub fn spawn(
        size: usize,
        queue: mpsc::Receiver<Feed>,
        processor: Arc<FeedProcessor>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self> {
        if size < 1 {
            return Err(Error::InvalidSize(size as i64));
        }

        let mut pool = Self {
            queue: Arc::new(Mutex::new(queue)),
            processor,
            shutdown,
            workers: Vec::with_capacity(size),
            retiring: Vec::new(),
            next_id: 0,
            closed: false,
        };
        for _ in 0..size {
            pool.spawn_worker();
        }

        Ok(pool)
    }

    /// Number of active (not retiring) runners
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Runners that were stopped by a shrink but have not exited yet
    pub fn retiring_count(&mut self) -> usize {
        self.retiring.retain(|task| !task.is_finished());
        self.retiring.len()
    }

    /// Grow or shrink to `requested` runners.
    ///
    /// Shrinking stops the most recently added runners; any feed they have
    /// already claimed is still finished. The queue is never touched.
    pub fn resize(&mut self, requested: i64) -> Result<Resized> {
        if requested < 1 {
            return Err(Error::InvalidSize(requested));
        }
        if self.closed {
            return Err(Error::Other("worker pool is shut down".to_string()));
        }

        let old = self.workers.len();
        let new = usize::try_from(requested).map_err(|_| Error::InvalidSize(requested))?;

        if new > old {
            for _ in old..new {
                self.spawn_worker();
            }
        } else {
            for _ in new..old {
                if let Some(worker) = self.workers.pop() {
                    debug!(worker = worker.id, "Stopping worker");
                    let _ = worker.stop.send(());
                    self.retiring.push(worker.task);
                }
            }
        }
        self.retiring.retain(|task| !task.is_finished());

        info!("Resized workers from {} to {}", old, new);
        Ok(Resized { old, new })
    }

    /// Signal every runner and wait until all of them have exited
    pub async fn shutdown(&mut self) {
        self.closed = true;

        for worker in self.workers.drain(..) {
            let _ = worker.stop.send(());
            self.retiring.push(worker.task);
        }

        for task in self.retiring.drain(..) {
            if let Err(e) = task.await {
                warn!("Worker task failed: {}", e);
            }
        }

        debug!("All workers stopped");
    }

    fn spawn_worker(&mut self) {
        let id = self.next_id;
        self.next_id += 1;

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_worker(
            id,
            self.queue.clone(),
            self.processor.clone(),
            stop_rx,
            self.shutdown.clone(),
        ));

        self.workers.push(Worker {
            id,
            stop: stop_tx,
            task,
        });
    }
}

async fn next_feed(queue: &SharedQueue) -> Option<Feed> {
    queue.lock().await.recv().await
}

async fn run_worker(
    id: usize,
    queue: SharedQueue,
    processor: Arc<FeedProcessor>,
    mut stop: oneshot::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker = id, "Worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }

        let next = tokio::select! {
            biased;

            _ = &mut stop => break,

            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }

            feed = next_feed(&queue) => feed,
        };

        let Some(feed) = next else {
            debug!(worker = id, "Work queue closed");
            break;
        };

        debug!(worker = id, "Worker fetching feed: {} ({})", feed.name, feed.url);
        // Runs to completion; stop and shutdown are only observed between feeds
        let _ = processor.process(&feed).await;
    }

    debug!(worker = id, "Worker stopped");
}
