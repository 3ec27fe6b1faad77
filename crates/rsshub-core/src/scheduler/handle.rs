use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use super::pool::{Resized, SharedPool};
use crate::duration::format_duration;
use crate::{Error, Result};

/// Runtime controls of a running engine, cloned into every control handler
#[derive(Clone)]
pub struct EngineHandle {
    pool: SharedPool,
    period: Arc<watch::Sender<Duration>>,
}

impl EngineHandle {
    pub fn new(pool: SharedPool, period: Arc<watch::Sender<Duration>>) -> Self {
        Self { pool, period }
    }

    pub fn interval(&self) -> Duration {
        *self.period.borrow()
    }

    /// Swap the tick period and return the previous one
    pub fn set_interval(&self, period: Duration) -> Result<Duration> {
        if period.is_zero() {
            return Err(Error::InvalidDuration(format_duration(period)));
        }

        let old = self.period.send_replace(period);
        info!(
            "Interval of fetching feeds changed from {} to {}",
            format_duration(old),
            format_duration(period)
        );
        Ok(old)
    }

    pub async fn worker_count(&self) -> usize {
        self.pool.lock().await.size()
    }

    pub async fn resize(&self, count: i64) -> Result<Resized> {
        self.pool.lock().await.resize(count)
    }
}
