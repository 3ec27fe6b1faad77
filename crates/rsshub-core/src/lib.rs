pub mod aggregator;
pub mod config;
pub mod control;
pub mod duration;
pub mod error;
pub mod feed;
pub mod scheduler;
pub mod storage;

#[cfg(test)]
mod testing;

pub use aggregator::{Aggregator, RunningAggregator};
pub use config::AppConfig;
pub use control::{ControlClient, ControlServer};
pub use error::{Error, Result};
