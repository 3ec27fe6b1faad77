use anyhow::Result;

use rsshub_core::{
    storage::{Database, FeedRepository},
    Error,
};

pub async fn run(db: &Database, name: &str) -> Result<()> {
    if !FeedRepository::new(db).delete_by_name(name).await? {
        return Err(Error::FeedNotFound(name.to_string()).into());
    }

    println!("Feed deleted: {}", name);
    Ok(())
}
