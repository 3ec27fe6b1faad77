use anyhow::Result;

use rsshub_core::storage::{Database, FeedRepository};

pub async fn run(db: &Database, num: Option<u32>) -> Result<()> {
    let feed_repo = FeedRepository::new(db);
    let feeds = feed_repo.list(num).await?;

    if feeds.is_empty() {
        println!("No feeds yet.");
        println!("\nTo add a feed, run:");
        println!("  rsshub add --name <name> --url <url>");
        return Ok(());
    }

    println!("# Available RSS Feeds\n");

    for (i, feed) in feeds.iter().enumerate() {
        println!("{}. Name: {}", i + 1, feed.name);
        println!("   URL: {}", feed.url);
        println!("   Added: {}", feed.created_at.format("%Y-%m-%d %H:%M"));
        match feed.last_refreshed_at {
            Some(at) => println!("   Last refreshed: {}", at.format("%Y-%m-%d %H:%M")),
            None => println!("   Last refreshed: never"),
        }
        if let Some(err) = &feed.fetch_error {
            println!("   [ERROR: {}]", err);
        }
        println!();
    }

    let total = feed_repo.count().await?;
    if (total as usize) > feeds.len() {
        println!("Showing {} of {} feeds", feeds.len(), total);
    }

    Ok(())
}
