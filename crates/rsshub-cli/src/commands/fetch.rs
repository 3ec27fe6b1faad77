use std::sync::Arc;

use anyhow::Result;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

use rsshub_core::{
    duration::format_duration, feed::FeedFetcher, storage::Database, Aggregator, AppConfig,
    ControlClient, Error,
};

/// Run the aggregator in the foreground until SIGINT or SIGTERM
pub async fn run(db: Database, config: &AppConfig) -> Result<()> {
    if ControlClient::new(config.socket_path()).is_running().await {
        println!("Background process is already running");
        return Ok(());
    }

    let store = Arc::new(db);
    let fetcher = Arc::new(FeedFetcher::new(config)?);

    let aggregator = Aggregator::from_config(config, store.clone(), fetcher)?;
    let running = match aggregator.start().await {
        Ok(running) => running,
        // Another instance bound the socket in between
        Err(Error::AlreadyRunning(_)) => {
            println!("Background process is already running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "The background process for fetching feeds has started (interval = {}, workers = {})",
        format_duration(running.interval()),
        running.worker_count().await
    );

    let waited = wait_for_signal().await;

    running.stop().await;
    store.close().await;
    println!("Graceful shutdown: aggregator stopped");

    waited
}

async fn wait_for_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }

    info!("Received shutdown signal");
    Ok(())
}
