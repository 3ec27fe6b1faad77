use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rsshub_core::{storage::Database, AppConfig};

mod commands;

#[derive(Parser)]
#[command(name = "rsshub")]
#[command(author, version, about = "Background RSS aggregator with a live control socket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start fetching feeds in the background until interrupted
    Fetch,
    /// Add a new feed
    Add {
        /// Unique name of the feed
        #[arg(long)]
        name: String,
        /// RSS or Atom feed URL
        #[arg(long)]
        url: String,
    },
    /// List feeds, newest first
    List {
        /// Number of feeds to show (all when omitted)
        #[arg(long)]
        num: Option<u32>,
    },
    /// Delete a feed and its articles
    Delete {
        /// Name of the feed to delete
        #[arg(long)]
        name: String,
    },
    /// Show the latest articles of a feed
    Articles {
        /// Name of the feed
        #[arg(long = "feed-name")]
        feed_name: String,
        /// Number of articles to show
        #[arg(long, default_value_t = 3)]
        num: u32,
    },
    /// Change the fetch interval of the running aggregator (e.g. 2m, 90s)
    SetInterval {
        duration: String,
    },
    /// Change the number of workers of the running aggregator
    SetWorkers {
        // Kept as text so the running aggregator reports bad input itself
        count: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Fetch => {
            let db = Database::new(&config).await?;
            commands::fetch::run(db, &config).await
        }
        Commands::Add { name, url } => {
            let db = Database::new(&config).await?;
            commands::add::run(&db, &name, &url).await
        }
        Commands::List { num } => {
            let db = Database::new(&config).await?;
            commands::list::run(&db, num).await
        }
        Commands::Delete { name } => {
            let db = Database::new(&config).await?;
            commands::delete::run(&db, &name).await
        }
        Commands::Articles { feed_name, num } => {
            let db = Database::new(&config).await?;
            commands::articles::run(&db, &feed_name, num).await
        }
        Commands::SetInterval { duration } => commands::control::set_interval(&config, &duration).await,
        Commands::SetWorkers { count } => commands::control::set_workers(&config, &count).await,
    }
}
