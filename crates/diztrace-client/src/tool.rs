use std::io;

use diztrace_protocol::{
    decode_envelope, encode_envelope, AbridgedItem, Addr24, CpuFlags, ProtocolError, TraceItem,
};
use thiserror::Error;
use tracing::debug;

use crate::transport::{TraceTransport, TransportError};

/// Chunk stream of the built-in sample list.
pub const DEMO_CHUNK_BYTES: [u8; 10] =
    [0xEE, 0x08, 0x01, 0x23, 0x45, 0x02, 0x89, 0xAB, 0xCD, 0xEF];

/// The built-in sample list sent by [`TraceIpcTool::send_demo`]; decodes from
/// [`DEMO_CHUNK_BYTES`].
pub fn demo_items() -> Vec<TraceItem> {
    vec![TraceItem::Abridged(AbridgedItem {
        addr: Addr24::new(0x45_2301),
        opcode_len: 2,
        direct_page: 0xAB89,
        data_bank: 0xCD,
        flags: CpuFlags::from_bits_retain(0xEF),
    })]
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed trace message: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),
}

impl ToolError {
    pub fn is_connection_refused(&self) -> bool {
        matches!(self, ToolError::Transport(err) if err.is_connection_refused())
    }
}

/// Send/receive actions for trace exchange with an external emulator.
#[derive(Debug, Clone)]
pub struct TraceIpcTool<T> {
    transport: T,
}

impl<T: TraceTransport> TraceIpcTool<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn send_items(&self, items: &[TraceItem]) -> Result<(), ToolError> {
        let envelope = encode_envelope(items)?;
        debug!(items = items.len(), bytes = envelope.len(), "sending trace envelope");
        self.transport.send(&envelope)?;
        Ok(())
    }

    pub fn send_demo(&self) -> Result<(), ToolError> {
        self.send_items(&demo_items())
    }

    pub fn receive_items(&self) -> Result<Vec<TraceItem>, ToolError> {
        let bytes = self.transport.receive()?;
        let items = decode_envelope(&bytes)?;
        debug!(items = items.len(), bytes = bytes.len(), "decoded trace envelope");
        Ok(items)
    }

    /// Writes the item count, then one rendered line per item. Returns the item count.
    pub fn receive_and_print<W: io::Write>(&self, out: &mut W) -> Result<usize, ToolError> {
        let items = self.receive_items()?;
        write_items(out, &items).map_err(ToolError::Output)?;
        Ok(items.len())
    }
}

pub fn write_items<W: io::Write>(out: &mut W, items: &[TraceItem]) -> io::Result<()> {
    writeln!(out, "{}", items.len())?;
    for item in items {
        writeln!(out, "{item}")?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use diztrace_protocol::{parse_chunks, ENVELOPE_HEADER_LEN};

    #[derive(Default)]
    struct LoopbackTransport {
        sent: RefCell<Vec<Vec<u8>>>,
        inbox: RefCell<Option<Vec<u8>>>,
    }

    impl TraceTransport for LoopbackTransport {
        fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
            self.sent.borrow_mut().push(bytes.to_vec());
            Ok(())
        }

        fn receive(&self) -> Result<Vec<u8>, TransportError> {
            Ok(self.inbox.borrow_mut().take().unwrap_or_default())
        }
    }

    #[test]
    fn demo_items_match_demo_bytes() {
        assert_eq!(parse_chunks(&DEMO_CHUNK_BYTES).unwrap(), demo_items());
    }

    #[test]
    fn send_demo_emits_one_envelope() {
        let tool = TraceIpcTool::new(LoopbackTransport::default());
        tool.send_demo().unwrap();

        let sent = tool.transport().sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][0], b'Z');
        assert_eq!(decode_envelope(&sent[0]).unwrap(), demo_items());
    }

    #[test]
    fn receive_and_print_reports_count_then_items() {
        let transport = LoopbackTransport::default();
        *transport.inbox.borrow_mut() = Some(encode_envelope(&demo_items()).unwrap());
        let tool = TraceIpcTool::new(transport);

        let mut out = Vec::new();
        let count = tool.receive_and_print(&mut out).unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1\nat 0x452301: 2-byte opcode; A:???? X:???? Y:???? S:???? D:AB89 DB:CD NVMX.IZC\n"
        );
    }

    #[test]
    fn empty_message_is_a_format_error() {
        let tool = TraceIpcTool::new(LoopbackTransport::default());
        let mut out = Vec::new();
        let err = tool.receive_and_print(&mut out).unwrap_err();
        assert!(matches!(
            err,
            ToolError::Protocol(ProtocolError::BufferTooSmall { len: 0 })
        ));
        assert!(!err.is_connection_refused());
        assert!(out.is_empty());
    }

    #[test]
    fn truncated_message_is_rejected() {
        let mut env = encode_envelope(&demo_items()).unwrap();
        env.truncate(ENVELOPE_HEADER_LEN + 1);
        let transport = LoopbackTransport::default();
        *transport.inbox.borrow_mut() = Some(env);

        let err = TraceIpcTool::new(transport).receive_items().unwrap_err();
        assert!(matches!(
            err,
            ToolError::Protocol(ProtocolError::LengthMismatch { .. })
        ));
    }
}
