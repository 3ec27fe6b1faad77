use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use super::protocol::Command;
use crate::{Error, Result};

/// Sends control commands to a running engine
#[derive(Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Whether something accepts connections on the socket
    pub async fn is_running(&self) -> bool {
        UnixStream::connect(&self.socket_path).await.is_ok()
    }

    /// Send one command and return the reply without its trailing newline.
    ///
    /// An empty reply means the server dropped the line.
    pub async fn send(&self, command: &Command) -> Result<String> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|_| Error::NotRunning(self.socket_path.clone()))?;

        stream.write_all(format!("{}\n", command).as_bytes()).await?;
        stream.flush().await?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply).await?;

        Ok(reply.trim_end().to_string())
    }

    pub async fn set_interval(&self, duration: &str) -> Result<String> {
        self.send(&Command::SetInterval(duration.to_string())).await
    }

    pub async fn set_workers(&self, count: &str) -> Result<String> {
        self.send(&Command::SetWorkers(count.to_string())).await
    }
}
