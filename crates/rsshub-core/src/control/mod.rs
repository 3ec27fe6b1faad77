mod client;
pub mod protocol;
mod server;

pub use client::ControlClient;
pub use protocol::Command;
pub use server::{execute, ControlServer};
pub(crate) use server::remove_socket;
