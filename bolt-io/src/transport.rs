//! The Bolt handshake and per-message chunk transport, built on top of
//! [`RingReader`]/[`RingWriter`].

use bytes::{Bytes, BytesMut};
use tokio::io::{split, AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

use bolt_codec::framing::{encode_message, ChunkDecodeOutcome, ChunkDecoder};
use bolt_codec::MAX_CHUNK_SIZE;
use bolt_wire::{BoltError, BoltVersion, ErrorCode};

use crate::ring::{RingReader, RingWriter};

/// The 4-byte magic preamble every Bolt handshake opens with, before the
/// four candidate version `u32`s (§6).
pub const HANDSHAKE_MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// A live Bolt connection: the handshake plus send/recv of whole,
/// chunk-framed messages. Generic over any split-capable duplex stream —
/// a TCP socket in production, `tokio::io::duplex` in tests.
pub struct BoltTransport<S> {
    reader: RingReader<ReadHalf<S>>,
    writer: RingWriter<WriteHalf<S>>,
    decoder: ChunkDecoder,
    max_chunk_size: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> BoltTransport<S> {
    pub fn new(stream: S, max_message_size: usize) -> Self {
        let (read_half, write_half) = split(stream);
        BoltTransport {
            reader: RingReader::new(read_half),
            writer: RingWriter::new(write_half),
            decoder: ChunkDecoder::new(max_message_size),
            max_chunk_size: MAX_CHUNK_SIZE,
        }
    }

    pub fn set_max_chunk_size(&mut self, size: usize) {
        self.max_chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
    }

    /// Split back into the underlying ring reader/writer, preserving
    /// whatever the reader has already buffered. Used to hand the
    /// post-handshake connection off to a message layer that speaks whole
    /// messages instead of raw handshake bytes.
    pub fn into_parts(self) -> (RingReader<ReadHalf<S>>, RingWriter<WriteHalf<S>>) {
        (self.reader, self.writer)
    }

    /// Client side of the handshake (§6): send the magic preamble and four
    /// candidate versions, read back the server's chosen version.
    pub async fn client_handshake(&mut self) -> Result<BoltVersion, BoltError> {
        self.writer.queue(&HANDSHAKE_MAGIC);
        for candidate in BoltVersion::candidates() {
            self.writer.queue(&candidate.to_be_bytes());
        }
        self.writer.flush().await?;

        let chosen = self.read_u32_blocking().await?;
        BoltVersion::from_handshake(chosen).ok_or(BoltError::HandshakeNoAgreement)
    }

    /// Server side of the handshake: read the magic preamble and four
    /// candidates, return the first one this engine supports (or `None`,
    /// meaning the caller should write back version `0` and close).
    pub async fn server_handshake(&mut self) -> Result<Option<BoltVersion>, BoltError> {
        let magic = self.read_exact_blocking(4).await?;
        if magic[..] != HANDSHAKE_MAGIC {
            return Err(BoltError::Protocol {
                code: ErrorCode::ProtocolViolation,
                detail: "bad handshake magic".into(),
            });
        }
        let mut chosen = None;
        for _ in 0..4 {
            let candidate = self.read_u32_blocking().await?;
            if chosen.is_none() {
                chosen = BoltVersion::from_handshake(candidate);
            }
        }
        Ok(chosen)
    }

    pub async fn send_handshake_response(&mut self, version: Option<BoltVersion>) -> Result<(), BoltError> {
        let value = version.map(BoltVersion::to_handshake).unwrap_or(0);
        self.writer.queue(&value.to_be_bytes());
        self.writer.flush().await
    }

    /// Encode `message` bytes as one or more chunks and flush them.
    pub async fn send_message(&mut self, message: &[u8]) -> Result<(), BoltError> {
        let mut framed = BytesMut::new();
        encode_message(message, self.max_chunk_size, &mut framed);
        self.writer.queue(&framed);
        self.writer.flush().await
    }

    /// Read chunks from the socket until a complete message is reassembled.
    pub async fn recv_message(&mut self) -> Result<Vec<u8>, BoltError> {
        loop {
            if self.reader.buffered_len() > 0 {
                let mut input: Bytes = self.reader.take(self.reader.buffered_len()).freeze();
                match self.decoder.poll(&mut input) {
                    Ok(ChunkDecodeOutcome::Message(message)) => {
                        // Anything past the terminator belongs to the next
                        // message; push it back onto the front of the buffer.
                        if !input.is_empty() {
                            self.reader.unread(&input);
                        }
                        return Ok(message);
                    }
                    Ok(ChunkDecodeOutcome::NeedMore) => {
                        self.reader.unread(&input);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            let n = self.reader.fill().await?;
            if n == 0 {
                return Err(BoltError::Transport {
                    code: ErrorCode::TransportClosed,
                    detail: "peer closed connection".into(),
                });
            }
        }
    }

    async fn read_exact_blocking(&mut self, n: usize) -> Result<BytesMut, BoltError> {
        while self.reader.buffered_len() < n {
            let read = self.reader.fill().await?;
            if read == 0 {
                return Err(BoltError::HandshakeUnexpectedEof);
            }
        }
        Ok(self.reader.take(n))
    }

    async fn read_u32_blocking(&mut self) -> Result<u32, BoltError> {
        let bytes = self.read_exact_blocking(4).await?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn handshake_round_trips_chosen_version() {
        let (client_stream, server_stream) = duplex(4096);
        let mut client = BoltTransport::new(client_stream, 1 << 20);
        let mut server = BoltTransport::new(server_stream, 1 << 20);

        let client_task = tokio::spawn(async move { client.client_handshake().await });
        let server_task = tokio::spawn(async move {
            let chosen = server.server_handshake().await.unwrap();
            server.send_handshake_response(chosen).await.unwrap();
            chosen
        });

        let server_chosen = server_task.await.unwrap();
        let client_chosen = client_task.await.unwrap().unwrap();
        assert_eq!(server_chosen, Some(BoltVersion::V2));
        assert_eq!(client_chosen, BoltVersion::V2);
    }

    #[tokio::test]
    async fn message_round_trips() {
        let (a, b) = duplex(4096);
        let mut sender = BoltTransport::new(a, 1 << 20);
        let mut receiver = BoltTransport::new(b, 1 << 20);

        let payload = b"RUN statement bytes".to_vec();
        let send_task = tokio::spawn({
            let payload = payload.clone();
            async move { sender.send_message(&payload).await }
        });
        let received = receiver.recv_message().await.unwrap();
        send_task.await.unwrap().unwrap();
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn two_pipelined_messages_are_received_in_order() {
        let (a, b) = duplex(4096);
        let mut sender = BoltTransport::new(a, 1 << 20);
        let mut receiver = BoltTransport::new(b, 1 << 20);

        let send_task = tokio::spawn(async move {
            sender.send_message(b"first").await.unwrap();
            sender.send_message(b"second").await.unwrap();
        });

        let first = receiver.recv_message().await.unwrap();
        let second = receiver.recv_message().await.unwrap();
        send_task.await.unwrap();
        assert_eq!(first, b"first");
        assert_eq!(second, b"second");
    }
}
