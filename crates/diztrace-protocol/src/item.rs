use core::fmt;

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkType {
    Abridged = 0xEE,
    /// Full register set. Reserved; the body layout is not defined yet.
    Unabridged = 0xEF,
}

impl ChunkType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0xEE => Some(ChunkType::Abridged),
            0xEF => Some(ChunkType::Unabridged),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChunkType::Abridged => "Abridged",
            ChunkType::Unabridged => "Unabridged",
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

bitflags! {
    /// 65816 processor status register (`P`).
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct CpuFlags: u8 {
        const N = 0x80;
        const V = 0x40;
        const M = 0x20;
        const X = 0x10;
        const D = 0x08;
        const I = 0x04;
        const Z = 0x02;
        const C = 0x01;
    }
}

impl CpuFlags {
    const MNEMONIC_ORDER: [(CpuFlags, char); 8] = [
        (CpuFlags::N, 'N'),
        (CpuFlags::V, 'V'),
        (CpuFlags::M, 'M'),
        (CpuFlags::X, 'X'),
        (CpuFlags::D, 'D'),
        (CpuFlags::I, 'I'),
        (CpuFlags::Z, 'Z'),
        (CpuFlags::C, 'C'),
    ];

    /// Eight characters in `NVMXDIZC` order; clear flags are shown as `.`.
    pub fn mnemonic(self) -> String {
        Self::MNEMONIC_ORDER
            .iter()
            .map(|&(flag, c)| if self.contains(flag) { c } else { '.' })
            .collect()
    }
}

/// 24-bit SNES program address (bank in bits 16..24).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Addr24(u32);

impl Addr24 {
    pub const MASK: u32 = 0x00FF_FFFF;

    /// Bits above 24 are discarded.
    pub const fn new(raw: u32) -> Self {
        Self(raw & Self::MASK)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn from_le_bytes(bytes: [u8; 3]) -> Self {
        Self(u32::from(bytes[0]) | (u32::from(bytes[1]) << 8) | (u32::from(bytes[2]) << 16))
    }

    pub fn to_le_bytes(self) -> [u8; 3] {
        let [lo, mid, hi, _] = self.0.to_le_bytes();
        [lo, mid, hi]
    }
}

impl fmt::Display for Addr24 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:06X}", self.0)
    }
}

/// Compact CPU state captured at one executed instruction. General purpose registers are not
/// part of this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AbridgedItem {
    pub addr: Addr24,
    pub opcode_len: u8,
    pub direct_page: u16,
    pub data_bank: u8,
    pub flags: CpuFlags,
}

impl AbridgedItem {
    /// Fixed body length of an abridged chunk.
    pub const LEN: usize = 8;

    pub fn from_payload(payload: &[u8; Self::LEN]) -> Self {
        Self {
            addr: Addr24::from_le_bytes([payload[0], payload[1], payload[2]]),
            opcode_len: payload[3],
            direct_page: u16::from_le_bytes([payload[4], payload[5]]),
            data_bank: payload[6],
            flags: CpuFlags::from_bits_retain(payload[7]),
        }
    }

    pub fn write_payload(&self, out: &mut [u8; Self::LEN]) {
        out[0..3].copy_from_slice(&self.addr.to_le_bytes());
        out[3] = self.opcode_len;
        out[4..6].copy_from_slice(&self.direct_page.to_le_bytes());
        out[6] = self.data_bank;
        out[7] = self.flags.bits();
    }
}

impl fmt::Display for AbridgedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // A/X/Y/S are not carried by abridged records.
        write!(
            f,
            "at {}: {}-byte opcode; A:???? X:???? Y:???? S:???? D:{:04X} DB:{:02X} {}",
            self.addr,
            self.opcode_len,
            self.direct_page,
            self.data_bank,
            self.flags.mnemonic()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceItem {
    Abridged(AbridgedItem),
    Unabridged,
}

impl TraceItem {
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            TraceItem::Abridged(_) => ChunkType::Abridged,
            TraceItem::Unabridged => ChunkType::Unabridged,
        }
    }

    pub fn as_abridged(&self) -> Option<&AbridgedItem> {
        match self {
            TraceItem::Abridged(item) => Some(item),
            TraceItem::Unabridged => None,
        }
    }
}

impl From<AbridgedItem> for TraceItem {
    fn from(item: AbridgedItem) -> Self {
        TraceItem::Abridged(item)
    }
}

impl fmt::Display for TraceItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceItem::Abridged(item) => fmt::Display::fmt(item, f),
            TraceItem::Unabridged => f.write_str("unabridged record (unsupported)"),
        }
    }
}
