use std::time::Duration;

use diztrace_protocol::{DEFAULT_MAX_DECOMPRESSED_LEN, ENVELOPE_HEADER_LEN};
use thiserror::Error;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 27015;

/// Deflate output for incompressible input is slightly larger than the input; leave headroom
/// over the decompressed limit.
pub const DEFAULT_MAX_MESSAGE_LEN: usize =
    ENVELOPE_HEADER_LEN + DEFAULT_MAX_DECOMPRESSED_LEN + DEFAULT_MAX_DECOMPRESSED_LEN / 64;

pub const ENV_HOST: &str = "DIZTRACE_HOST";
pub const ENV_PORT: &str = "DIZTRACE_PORT";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "DIZTRACE_CONNECT_TIMEOUT_MS";
pub const ENV_IO_TIMEOUT_MS: &str = "DIZTRACE_IO_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    /// `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
    /// Applied to both reads and writes. `None` blocks indefinitely.
    pub io_timeout: Option<Duration>,
    pub max_message_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            connect_timeout: None,
            io_timeout: None,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

impl TransportConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`TransportConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let host = match lookup(ENV_HOST) {
            Some(raw) if raw.trim().is_empty() => return Err(ConfigError::InvalidEnv(ENV_HOST)),
            Some(raw) => raw.trim().to_owned(),
            None => defaults.host,
        };
        let port = match lookup(ENV_PORT) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|&port| port != 0)
                .ok_or(ConfigError::InvalidEnv(ENV_PORT))?,
            None => defaults.port,
        };
        let connect_timeout = parse_millis(&lookup, ENV_CONNECT_TIMEOUT_MS)?;
        let io_timeout = parse_millis(&lookup, ENV_IO_TIMEOUT_MS)?;

        Ok(Self {
            host,
            port,
            connect_timeout,
            io_timeout,
            max_message_len: defaults.max_message_len,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let ms = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnv(name))?;
    // Zero means "no timeout"; std rejects a zero Duration for socket timeouts.
    Ok((ms != 0).then(|| Duration::from_millis(ms)))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for env var {0}")]
    InvalidEnv(&'static str),
}
