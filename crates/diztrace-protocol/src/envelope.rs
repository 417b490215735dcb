//! Compressed envelope around a chunk stream.
//!
//! Wire format (length fields little-endian):
//!
//! ```text
//! 0         1                     5                   9
//! +---------+---------------------+-------------------+
//! | 'Z'     | decompressed_len u32| compressed_len u32|  header (9 bytes)
//! +---------+---------------------+-------------------+
//! | raw deflate stream (compressed_len bytes)         |
//! +---------------------------------------------------+
//! ```

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::chunk::{encode_chunk_into, parse_chunks};
use crate::error::{ProtocolError, Result};
use crate::item::TraceItem;

pub const ENVELOPE_MAGIC: u8 = b'Z';
pub const ENVELOPE_HEADER_LEN: usize = 9;

pub const DEFAULT_MAX_DECOMPRESSED_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_decompressed_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_decompressed_len: DEFAULT_MAX_DECOMPRESSED_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub decompressed_len: u32,
    pub compressed_len: u32,
}

impl EnvelopeHeader {
    /// Validates the magic byte and that `buf` holds exactly the declared compressed body.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < ENVELOPE_HEADER_LEN {
            return Err(ProtocolError::BufferTooSmall { len: buf.len() });
        }
        if buf[0] != ENVELOPE_MAGIC {
            return Err(ProtocolError::BadMagicByte(buf[0]));
        }

        let compressed_len = u32::from_le_bytes([buf[5], buf[6], buf[7], buf[8]]);
        let expected = ENVELOPE_HEADER_LEN
            .checked_add(compressed_len as usize)
            .ok_or(ProtocolError::TooLarge {
                len: compressed_len as usize,
                max: usize::MAX - ENVELOPE_HEADER_LEN,
            })?;
        if buf.len() != expected {
            return Err(ProtocolError::LengthMismatch {
                field: "envelope",
                expected,
                found: buf.len(),
            });
        }

        let decompressed_len = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]);
        Ok(Self {
            decompressed_len,
            compressed_len,
        })
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(ENVELOPE_MAGIC);
        out.extend_from_slice(&self.decompressed_len.to_le_bytes());
        out.extend_from_slice(&self.compressed_len.to_le_bytes());
    }
}

pub fn encode_envelope_with_limits(items: &[TraceItem], limits: &Limits) -> Result<Vec<u8>> {
    let mut plain = Vec::new();
    for item in items {
        encode_chunk_into(item, &mut plain)?;
    }
    if plain.len() > limits.max_decompressed_len {
        return Err(ProtocolError::TooLarge {
            len: plain.len(),
            max: limits.max_decompressed_len,
        });
    }

    let compressed = deflate(&plain)?;
    let header = EnvelopeHeader {
        decompressed_len: len_u32(plain.len())?,
        compressed_len: len_u32(compressed.len())?,
    };

    let mut out = Vec::with_capacity(ENVELOPE_HEADER_LEN + compressed.len());
    header.write_to(&mut out);
    out.extend_from_slice(&compressed);
    Ok(out)
}

pub fn encode_envelope(items: &[TraceItem]) -> Result<Vec<u8>> {
    encode_envelope_with_limits(items, &Limits::default())
}

pub fn decode_envelope_with_limits(buf: &[u8], limits: &Limits) -> Result<Vec<TraceItem>> {
    let header = EnvelopeHeader::parse(buf)?;
    let expected_len = header.decompressed_len as usize;
    if expected_len > limits.max_decompressed_len {
        return Err(ProtocolError::TooLarge {
            len: expected_len,
            max: limits.max_decompressed_len,
        });
    }

    let plain = inflate(&buf[ENVELOPE_HEADER_LEN..], expected_len)?;
    parse_chunks(&plain)
}

pub fn decode_envelope(buf: &[u8]) -> Result<Vec<TraceItem>> {
    decode_envelope_with_limits(buf, &Limits::default())
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| ProtocolError::TooLarge {
        len,
        max: u32::MAX as usize,
    })
}

fn deflate(plain: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(plain)
        .map_err(|_| ProtocolError::CorruptedData("deflate failed"))?;
    encoder
        .finish()
        .map_err(|_| ProtocolError::CorruptedData("deflate failed"))
}

/// Inflates at most `expected_len + 1` bytes so an oversized stream is caught without
/// unbounded allocation. The deflate stream must end exactly at the end of `compressed`.
fn inflate(compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut decoder = DeflateDecoder::new(compressed);
    (&mut decoder)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|_| ProtocolError::CorruptedData("deflate stream is invalid"))?;
    if out.len() != expected_len {
        return Err(ProtocolError::CorruptedData(
            "decompressed length does not match header",
        ));
    }
    if decoder.total_in() != compressed.len() as u64 {
        return Err(ProtocolError::CorruptedData(
            "trailing bytes after deflate stream",
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: [u8; 10] = [0xEE, 0x08, 0x01, 0x23, 0x45, 0x02, 0x89, 0xAB, 0xCD, 0xEF];

    fn sample_items() -> Vec<TraceItem> {
        parse_chunks(&SAMPLE).unwrap()
    }

    #[test]
    fn header_layout() {
        let env = encode_envelope(&sample_items()).unwrap();
        assert_eq!(env[0], b'Z');
        assert_eq!(u32::from_le_bytes(env[1..5].try_into().unwrap()), 10);
        let compressed_len = u32::from_le_bytes(env[5..9].try_into().unwrap()) as usize;
        assert_eq!(env.len(), ENVELOPE_HEADER_LEN + compressed_len);
    }

    #[test]
    fn payload_is_raw_deflate_of_chunk_stream() {
        let env = encode_envelope(&sample_items()).unwrap();
        let mut plain = Vec::new();
        DeflateDecoder::new(&env[ENVELOPE_HEADER_LEN..])
            .read_to_end(&mut plain)
            .unwrap();
        assert_eq!(plain, SAMPLE);
    }

    #[test]
    fn accepts_foreign_deflate_stream() {
        // Stored (uncompressed) deflate block, as another encoder might emit.
        let mut stream = vec![0x01, 0x0A, 0x00, 0xF5, 0xFF];
        stream.extend_from_slice(&SAMPLE);
        let mut env = Vec::new();
        EnvelopeHeader {
            decompressed_len: 10,
            compressed_len: stream.len() as u32,
        }
        .write_to(&mut env);
        env.extend_from_slice(&stream);
        assert_eq!(decode_envelope(&env).unwrap(), sample_items());
    }

    #[test]
    fn empty_list_round_trips() {
        let env = encode_envelope(&[]).unwrap();
        assert_eq!(u32::from_le_bytes(env[1..5].try_into().unwrap()), 0);
        assert!(decode_envelope(&env).unwrap().is_empty());
    }

    #[test]
    fn empty_buffer_is_too_small() {
        assert_eq!(
            decode_envelope(&[]),
            Err(ProtocolError::BufferTooSmall { len: 0 })
        );
    }

    #[test]
    fn header_only_buffer_with_nonzero_compressed_len() {
        let buf = [b'Z', 0, 0, 0, 0, 4, 0, 0, 0];
        assert_eq!(
            decode_envelope(&buf),
            Err(ProtocolError::LengthMismatch {
                field: "envelope",
                expected: 13,
                found: 9
            })
        );
    }

    #[test]
    fn declared_length_over_limit_is_rejected_before_inflating() {
        let env = encode_envelope(&sample_items()).unwrap();
        let limits = Limits {
            max_decompressed_len: 4,
        };
        assert_eq!(
            decode_envelope_with_limits(&env, &limits),
            Err(ProtocolError::TooLarge { len: 10, max: 4 })
        );
        assert!(matches!(
            encode_envelope_with_limits(&sample_items(), &limits),
            Err(ProtocolError::TooLarge { .. })
        ));
    }

    #[test]
    fn decompressed_length_mismatch_is_corruption() {
        let mut env = encode_envelope(&sample_items()).unwrap();
        env[1] = 11;
        assert!(matches!(
            decode_envelope(&env),
            Err(ProtocolError::CorruptedData(_))
        ));
        env[1] = 9;
        assert!(matches!(
            decode_envelope(&env),
            Err(ProtocolError::CorruptedData(_))
        ));
    }

    #[test]
    fn unabridged_items_cannot_be_enveloped() {
        assert!(matches!(
            encode_envelope(&[TraceItem::Unabridged]),
            Err(ProtocolError::UnimplementedVariant(_))
        ));
    }
}
