//! Transport limits.
//!
//! | Field               | Variable                       | Default        |
//! |---------------------|--------------------------------|----------------|
//! | `max_message_bytes` | `BUFFERCOMM_MAX_MESSAGE_BYTES` | `i32::MAX`     |
//! | `recv_timeout`      | `BUFFERCOMM_RECV_TIMEOUT_MS`   | none (block)   |

use crate::error::{Error, Result};
use crate::message::DEFAULT_MAX_MESSAGE_BYTES;
use std::env;
use std::time::Duration;

pub const MAX_MESSAGE_BYTES_VAR: &str = "BUFFERCOMM_MAX_MESSAGE_BYTES";
pub const RECV_TIMEOUT_VAR: &str = "BUFFERCOMM_RECV_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Largest encoded generic message, in bytes.
    pub max_message_bytes: usize,
    /// How long a receive may block before failing; `None` blocks forever.
    pub recv_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            recv_timeout: None,
        }
    }
}

impl Config {
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }

    /// Defaults overridden by whichever environment variables are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(MAX_MESSAGE_BYTES_VAR) {
            config.max_message_bytes = parse(MAX_MESSAGE_BYTES_VAR, &value)?;
        }
        if let Some(value) = lookup(RECV_TIMEOUT_VAR) {
            config.recv_timeout = Some(Duration::from_millis(parse(RECV_TIMEOUT_VAR, &value)?));
        }
        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name}={value:?} is not a non-negative integer")))
}
