//! Per-record chunk codec.
//!
//! ```text
//! +-----------+-----------+------------------+
//! | type (u8) | len (u8)  | body (len bytes) |
//! +-----------+-----------+------------------+
//! ```
//!
//! `len` must equal the fixed body length of `type`. Multi-byte body fields are little-endian.

use crate::error::{ProtocolError, Result};
use crate::item::{AbridgedItem, ChunkType, TraceItem};

pub const CHUNK_HEADER_LEN: usize = 2;

/// Decode the chunk starting at `offset`, returning the item and the offset just past it.
pub fn decode_chunk(buf: &[u8], offset: usize) -> Result<(TraceItem, usize)> {
    let rest = buf.get(offset..).unwrap_or_default();
    if rest.len() < CHUNK_HEADER_LEN {
        return Err(ProtocolError::BufferTooShort {
            needed: CHUNK_HEADER_LEN,
            remaining: rest.len(),
        });
    }

    let tag = rest[0];
    let len = usize::from(rest[1]);
    match ChunkType::from_u8(tag) {
        Some(ChunkType::Abridged) => {
            if len != AbridgedItem::LEN {
                return Err(ProtocolError::LengthMismatch {
                    field: "abridged chunk",
                    expected: AbridgedItem::LEN,
                    found: len,
                });
            }
            let body = &rest[CHUNK_HEADER_LEN..];
            let payload: &[u8; AbridgedItem::LEN] = body
                .get(..AbridgedItem::LEN)
                .and_then(|b| b.try_into().ok())
                .ok_or(ProtocolError::BufferTooShort {
                    needed: CHUNK_HEADER_LEN + AbridgedItem::LEN,
                    remaining: rest.len(),
                })?;
            let item = AbridgedItem::from_payload(payload);
            Ok((
                TraceItem::Abridged(item),
                offset + CHUNK_HEADER_LEN + AbridgedItem::LEN,
            ))
        }
        Some(ty @ ChunkType::Unabridged) => Err(ProtocolError::UnimplementedVariant(ty)),
        None => Err(ProtocolError::UnknownChunkType(tag)),
    }
}

pub fn encode_chunk_into(item: &TraceItem, out: &mut Vec<u8>) -> Result<()> {
    let TraceItem::Abridged(abridged) = item else {
        return Err(ProtocolError::UnimplementedVariant(item.chunk_type()));
    };
    let mut body = [0u8; AbridgedItem::LEN];
    abridged.write_payload(&mut body);
    out.reserve(CHUNK_HEADER_LEN + AbridgedItem::LEN);
    out.push(item.chunk_type() as u8);
    out.push(AbridgedItem::LEN as u8);
    out.extend_from_slice(&body);
    Ok(())
}

pub fn encode_chunk(item: &TraceItem) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(CHUNK_HEADER_LEN + AbridgedItem::LEN);
    encode_chunk_into(item, &mut out)?;
    Ok(out)
}

/// Parse a back-to-back chunk stream. The whole buffer must be consumed; a final partial chunk
/// is reported as [`ProtocolError::TrailingBytes`].
pub fn parse_chunks(buf: &[u8]) -> Result<Vec<TraceItem>> {
    let mut items = Vec::with_capacity(buf.len() / (CHUNK_HEADER_LEN + AbridgedItem::LEN));
    let mut pos = 0;
    while pos < buf.len() {
        match decode_chunk(buf, pos) {
            Ok((item, next)) => {
                items.push(item);
                pos = next;
            }
            Err(ProtocolError::BufferTooShort { .. }) => {
                return Err(ProtocolError::TrailingBytes {
                    remaining: buf.len() - pos,
                });
            }
            Err(err) => return Err(err),
        }
    }
    Ok(items)
}
