#![forbid(unsafe_code)]

//! Client side of the trace exchange: one-shot TCP transport plus the send/receive actions a
//! debugging front end wires to its controls.

mod config;
mod tool;
mod transport;

pub use config::{
    ConfigError, TransportConfig, DEFAULT_HOST, DEFAULT_MAX_MESSAGE_LEN, DEFAULT_PORT,
    ENV_CONNECT_TIMEOUT_MS, ENV_HOST, ENV_IO_TIMEOUT_MS, ENV_PORT,
};
pub use tool::{demo_items, write_items, ToolError, TraceIpcTool, DEMO_CHUNK_BYTES};
pub use transport::{TcpTransport, TraceTransport, TransportError};
