//! Chunked message framing (§4.4): every message is split into one or more
//! `u16`-length-prefixed chunks of at most 65535 bytes, terminated by an
//! empty (zero-length) chunk. A message with no payload is still exactly
//! one empty chunk.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use bolt_wire::ErrorCode;

use crate::error::CodecError;

/// The wire ceiling on a single chunk's payload — the length prefix is a
/// `u16`, so nothing larger is representable regardless of configuration.
pub const MAX_CHUNK_SIZE: usize = 0xFFFF;

/// Split `message` into chunks of at most `max_chunk_size` bytes (clamped
/// to [`MAX_CHUNK_SIZE`]) and append them to `out`, followed by the
/// zero-length terminator chunk. An empty `message` still produces the
/// lone terminator chunk.
pub fn encode_message(message: &[u8], max_chunk_size: usize, out: &mut BytesMut) {
    let max = max_chunk_size.clamp(1, MAX_CHUNK_SIZE);
    if message.is_empty() {
        out.put_u16(0);
        return;
    }
    for chunk in message.chunks(max) {
        out.put_u16(chunk.len() as u16);
        out.put_slice(chunk);
    }
    out.put_u16(0);
}

/// Outcome of one [`ChunkDecoder::poll`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkDecodeOutcome {
    /// `input` doesn't yet hold a complete chunk; call again once more
    /// bytes have arrived.
    NeedMore,
    /// The terminator chunk was just consumed — `input` is advanced past
    /// it and the returned `Vec<u8>` is the complete reassembled message.
    Message(Vec<u8>),
}

/// Incremental chunk reassembler. Bytes arrive from the network in
/// arbitrary increments, so this accumulates partial chunks across calls
/// rather than assuming a full message is available in one `poll`.
pub struct ChunkDecoder {
    assembled: Vec<u8>,
    max_message_size: usize,
}

impl ChunkDecoder {
    pub fn new(max_message_size: usize) -> Self {
        ChunkDecoder {
            assembled: Vec::new(),
            max_message_size,
        }
    }

    /// Drain as many complete chunks as `input` currently holds, advancing
    /// it past each one consumed. Stops and returns `Message` the moment a
    /// terminator completes a message — call again to pick up any message
    /// that might already be fully buffered behind it.
    pub fn poll(&mut self, input: &mut Bytes) -> Result<ChunkDecodeOutcome, CodecError> {
        loop {
            if input.remaining() < 2 {
                return Ok(ChunkDecodeOutcome::NeedMore);
            }
            let len = u16::from_be_bytes([input[0], input[1]]) as usize;
            if len == 0 {
                input.advance(2);
                let message = std::mem::take(&mut self.assembled);
                return Ok(ChunkDecodeOutcome::Message(message));
            }
            if input.remaining() < 2 + len {
                return Ok(ChunkDecodeOutcome::NeedMore);
            }
            input.advance(2);
            if self.assembled.len() + len > self.max_message_size {
                self.assembled.clear();
                return Err(CodecError::new(
                    ErrorCode::MessageTooLarge,
                    format!("assembled message exceeds {} byte limit", self.max_message_size),
                ));
            }
            self.assembled.extend_from_slice(&input.split_to(len));
        }
    }
}
