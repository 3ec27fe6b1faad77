use anyhow::{bail, Result};

use rsshub_core::{
    feed::NewFeed,
    storage::{Database, FeedRepository},
};

pub async fn run(db: &Database, name: &str, url: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Feed name must not be empty");
    }

    let parsed = url::Url::parse(url.trim())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Feed URL must use http or https: {}", url);
    }

    let feed_repo = FeedRepository::new(db);
    if feed_repo.find_by_name(name).await?.is_some() {
        bail!("A feed named '{}' already exists", name);
    }

    let feed = feed_repo
        .create(&NewFeed {
            name: name.to_string(),
            url: parsed.to_string(),
        })
        .await?;

    println!("Feed added: {} ({})", feed.name, feed.url);
    Ok(())
}
