pub mod date;
mod fetcher;
mod models;
mod parser;

pub use date::{parse_pub_date, DateFormat};
pub use fetcher::{FeedFetcher, FeedSource};
pub use models::{Article, Feed, FeedEntry, NewArticle, NewFeed};
pub use parser::parse_entries;
