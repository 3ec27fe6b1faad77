mod handle;
mod pool;
mod processor;
mod ticker;

pub use handle::EngineHandle;
pub use pool::{Resized, SharedPool, SharedQueue, WorkerPool};
pub use processor::{FeedProcessor, RefreshReport};
pub use ticker::Scheduler;
