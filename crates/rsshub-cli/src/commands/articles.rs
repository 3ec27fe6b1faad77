use anyhow::Result;

use rsshub_core::{
    storage::{ArticleRepository, Database, FeedRepository},
    Error,
};

pub async fn run(db: &Database, feed_name: &str, num: u32) -> Result<()> {
    let Some(feed) = FeedRepository::new(db).find_by_name(feed_name).await? else {
        return Err(Error::FeedNotFound(feed_name.to_string()).into());
    };

    let articles = ArticleRepository::new(db)
        .list_by_feed_name(&feed.name, num)
        .await?;

    println!("Feed: {}\n", feed.name);

    if articles.is_empty() {
        println!("No articles yet.");
        return Ok(());
    }

    for (i, article) in articles.iter().enumerate() {
        println!(
            "{}. [{}] {}",
            i + 1,
            article.published_at.format("%Y-%m-%d"),
            article.title
        );
        println!("   {}\n", article.link);
    }

    Ok(())
}
