use thiserror::Error;

use crate::item::ChunkType;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("envelope too small: {len} < 9 byte header")]
    BufferTooSmall { len: usize },

    #[error("chunk truncated: need {needed} bytes, have {remaining}")]
    BufferTooShort { needed: usize, remaining: usize },

    #[error("missing magic byte (found 0x{0:02X}, expected 'Z')")]
    BadMagicByte(u8),

    #[error("{field} length mismatch: expected {expected}, found {found}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("unknown chunk type 0x{0:02X}")]
    UnknownChunkType(u8),

    #[error("{0} chunks are not implemented")]
    UnimplementedVariant(ChunkType),

    #[error("chunk stream has {remaining} trailing bytes that do not form a chunk")]
    TrailingBytes { remaining: usize },

    #[error("corrupted envelope payload: {0}")]
    CorruptedData(&'static str),

    #[error("payload too large: {len} > {max}")]
    TooLarge { len: usize, max: usize },
}

impl ProtocolError {
    /// Malformed or corrupted input, as opposed to a recognised chunk type that this crate
    /// cannot decode yet.
    pub fn is_format_error(&self) -> bool {
        !matches!(self, ProtocolError::UnimplementedVariant(_))
    }
}
