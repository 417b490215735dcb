#![forbid(unsafe_code)]

//! DiztinGUIsh trace-exchange wire format.
//!
//! A sender encodes a list of [`TraceItem`]s as back-to-back tagged chunks, deflates the chunk
//! stream and wraps it in a `'Z'` envelope that carries both the decompressed and the compressed
//! length. A receiver checks both lengths before handing the chunk stream back to the chunk
//! codec. This crate performs no I/O.

mod chunk;
mod envelope;
mod error;
mod item;

pub use crate::chunk::{
    decode_chunk, encode_chunk, encode_chunk_into, parse_chunks, CHUNK_HEADER_LEN,
};
pub use crate::envelope::{
    decode_envelope, decode_envelope_with_limits, encode_envelope, encode_envelope_with_limits,
    EnvelopeHeader, Limits, DEFAULT_MAX_DECOMPRESSED_LEN, ENVELOPE_HEADER_LEN, ENVELOPE_MAGIC,
};
pub use crate::error::{ProtocolError, Result};
pub use crate::item::{AbridgedItem, Addr24, ChunkType, CpuFlags, TraceItem};
