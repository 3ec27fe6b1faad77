use anyhow::{bail, Result};

use rsshub_core::{AppConfig, ControlClient, Error};

pub async fn set_interval(config: &AppConfig, duration: &str) -> Result<()> {
    let client = ControlClient::new(config.socket_path());
    print_reply(client.set_interval(duration).await)
}

pub async fn set_workers(config: &AppConfig, count: &str) -> Result<()> {
    let client = ControlClient::new(config.socket_path());
    print_reply(client.set_workers(count).await)
}

fn print_reply(reply: rsshub_core::Result<String>) -> Result<()> {
    match reply {
        Ok(text) if text.is_empty() => bail!("No reply from background process"),
        Ok(text) => {
            println!("{}", text);
            Ok(())
        }
        Err(Error::NotRunning(_)) => bail!("Background process is not running"),
        Err(e) => Err(e.into()),
    }
}
