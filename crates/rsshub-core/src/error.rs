use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("workers must be at least 1 (got {0})")]
    InvalidSize(i64),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("no matching format for pubDate: {0}")]
    DateFormatUnrecognized(String),

    #[error("Background process is already running (socket: {})", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("Background process is not running (socket: {})", .0.display())]
    NotRunning(PathBuf),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
