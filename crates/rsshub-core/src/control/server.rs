//! Control endpoint of a running engine
//!
//! Listens on a Unix socket, answers one command per connection, and doubles
//! as the single-instance guard: a second engine pointed at the same path
//! finds a live listener and refuses to start.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use super::protocol::{self, Command};
use crate::duration::parse_duration;
use crate::scheduler::EngineHandle;
use crate::{Error, Result};

/// Maximum number of commands applied at once; further connections wait
const MAX_CONCURRENT_REQUESTS: usize = 10;

pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
    requests: Arc<Semaphore>,
}

impl ControlServer {
    /// Claim `socket_path`.
    ///
    /// Fails with [`Error::AlreadyRunning`] if another process accepts
    /// connections there. A leftover file nobody listens on is replaced.
    pub async fn bind(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            if UnixStream::connect(socket_path).await.is_ok() {
                return Err(Error::AlreadyRunning(socket_path.to_path_buf()));
            }
            warn!("Removing stale control socket: {}", socket_path.display());
            std::fs::remove_file(socket_path)?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        info!("Control server listening on: {}", socket_path.display());

        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
            requests: Arc::new(Semaphore::new(MAX_CONCURRENT_REQUESTS)),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until shutdown, then remove the socket file
    pub async fn serve(self, engine: EngineHandle, mut shutdown: watch::Receiver<bool>) {
        let Self {
            listener,
            socket_path,
            requests,
        } = self;

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let engine = engine.clone();
                            let shutdown = shutdown.clone();
                            let requests = requests.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, engine, requests, shutdown).await {
                                    warn!("Error handling control connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            // The listener is gone; the engine keeps running without it
                            error!("Control listener failed: {}", e);
                            break;
                        }
                    }
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Control server shutting down");
                        break;
                    }
                }
            }
        }

        drop(listener);
        remove_socket(&socket_path);
    }
}

/// Remove the socket file if it is still there
pub(crate) fn remove_socket(socket_path: &Path) {
    match std::fs::remove_file(socket_path) {
        Ok(()) => debug!("Removed control socket: {}", socket_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove control socket {}: {}", socket_path.display(), e),
    }
}

async fn handle_connection(
    stream: UnixStream,
    engine: EngineHandle,
    requests: Arc<Semaphore>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader.take(protocol::MAX_LINE_BYTES));
    let mut line = String::new();

    let read = tokio::select! {
        read = reader.read_line(&mut line) => read?,
        _ = shutdown.changed() => return Ok(()),
    };
    if read == 0 {
        return Ok(());
    }

    let Some(command) = Command::parse(&line) else {
        debug!("Ignoring control line: {:?}", line.trim());
        return Ok(());
    };

    debug!("Received control command: {}", command);

    let reply = {
        let _permit = requests
            .acquire()
            .await
            .map_err(|e| Error::Other(format!("Failed to acquire request permit: {}", e)))?;
        execute(command, &engine).await
    };

    writer.write_all(reply.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    writer.shutdown().await?;

    Ok(())
}

/// Apply a command to the engine and build the reply text
pub async fn execute(command: Command, engine: &EngineHandle) -> String {
    match command {
        Command::SetInterval(arg) => {
            let period = match parse_duration(&arg) {
                Ok(period) if !period.is_zero() => period,
                _ => return protocol::INVALID_DURATION.to_string(),
            };
            match engine.set_interval(period) {
                Ok(old) => protocol::interval_changed(old, period),
                Err(_) => protocol::INVALID_DURATION.to_string(),
            }
        }
        Command::SetWorkers(arg) => {
            let Ok(count) = arg.parse::<i64>() else {
                return protocol::INVALID_COUNT.to_string();
            };
            match engine.resize(count).await {
                Ok(resized) => protocol::workers_changed(resized.old, resized.new),
                Err(e) => protocol::resize_failed(e),
            }
        }
    }
}
