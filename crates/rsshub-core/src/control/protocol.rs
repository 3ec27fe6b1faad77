//! Line-oriented control protocol
//!
//! A client sends one line, `<command> <argument>`, and reads a single
//! human-readable reply until the server closes the connection. Lines that
//! do not name a known command with an argument get no reply at all.

use std::fmt;
use std::time::Duration;

use crate::duration::format_duration;

pub const SET_INTERVAL: &str = "set-interval";
pub const SET_WORKERS: &str = "set-workers";

/// Longest request line the server reads
pub const MAX_LINE_BYTES: u64 = 1024;

pub const INVALID_DURATION: &str = "Invalid duration";
pub const INVALID_COUNT: &str = "Invalid count";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetInterval(String),
    SetWorkers(String),
}

impl Command {
    /// Parse a request line; tokens past the argument are ignored
    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next()?;
        let argument = tokens.next()?.to_string();

        match name {
            SET_INTERVAL => Some(Self::SetInterval(argument)),
            SET_WORKERS => Some(Self::SetWorkers(argument)),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetInterval(arg) => write!(f, "{} {}", SET_INTERVAL, arg),
            Self::SetWorkers(arg) => write!(f, "{} {}", SET_WORKERS, arg),
        }
    }
}

pub fn interval_changed(old: Duration, new: Duration) -> String {
    format!(
        "Interval of fetching feeds changed from {} to {}",
        format_duration(old),
        format_duration(new)
    )
}

pub fn workers_changed(old: usize, new: usize) -> String {
    format!("Number of workers changed from {} to {}", old, new)
}

pub fn resize_failed(err: impl fmt::Display) -> String {
    format!("Error resizing workers: {}", err)
}
