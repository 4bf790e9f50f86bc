//! The message layer (C6): whole [`Message`]s in and out over a chunked,
//! buffered transport.
//!
//! Reader and writer sides are guarded by independent locks — grounded on
//! the teacher's `StreamTransport`, which splits `reader`/`writer` into two
//! separate `AsyncMutex`es rather than one combined lock. That split is
//! what lets [`crate::session::Session::reset`] write a `RESET` onto the
//! wire while another task is parked mid-read waiting on a long-running
//! pull's next chunk.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;

use bolt_codec::framing::{encode_message, ChunkDecodeOutcome, ChunkDecoder};
use bolt_codec::{decode_message_body, encode_message_body, MAX_CHUNK_SIZE};
use bolt_io::ring::{RingReader, RingWriter};
use bolt_wire::{BoltError, BoltVersion, Message};

struct ReaderState<R> {
    ring: RingReader<R>,
    decoder: ChunkDecoder,
}

pub struct MessageLayer<R, W> {
    reader: AsyncMutex<ReaderState<R>>,
    writer: AsyncMutex<RingWriter<W>>,
    version: BoltVersion,
    max_chunk_size: usize,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> MessageLayer<R, W> {
    pub fn new(reader: R, writer: W, version: BoltVersion, max_message_size: usize) -> Self {
        Self::from_parts(RingReader::new(reader), RingWriter::new(writer), version, max_message_size)
    }

    /// Build a layer from a reader/writer pair that already exist — used
    /// right after the handshake, so any bytes the ring buffered beyond the
    /// 4-byte handshake response aren't discarded.
    pub fn from_parts(ring: RingReader<R>, writer: RingWriter<W>, version: BoltVersion, max_message_size: usize) -> Self {
        MessageLayer {
            reader: AsyncMutex::new(ReaderState {
                ring,
                decoder: ChunkDecoder::new(max_message_size),
            }),
            writer: AsyncMutex::new(writer),
            version,
            max_chunk_size: MAX_CHUNK_SIZE,
        }
    }

    pub fn set_max_chunk_size(&mut self, size: usize) {
        self.max_chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
    }

    /// Encode and flush one message. Can run concurrently with an in-flight
    /// `recv` — they contend on different locks. Returns the number of
    /// framed bytes written, for the session's metrics.
    pub async fn send(&self, message: &Message) -> Result<usize, BoltError> {
        let mut body = BytesMut::new();
        encode_message_body(message.signature, &message.argv, self.version, &mut body)?;

        let mut framed = BytesMut::new();
        encode_message(&body, self.max_chunk_size, &mut framed);
        let len = framed.len();

        let mut writer = self.writer.lock().await;
        writer.queue(&framed);
        writer.flush().await?;
        Ok(len)
    }

    /// Read chunks until a full message is reassembled, then decode it.
    /// Returns the decoded message alongside its reassembled body length,
    /// for the session's metrics.
    pub async fn recv(&self) -> Result<(Message, usize), BoltError> {
        let mut state = self.reader.lock().await;
        let body = loop {
            if state.ring.buffered_len() > 0 {
                let mut input: Bytes = state.ring.take(state.ring.buffered_len()).freeze();
                match state.decoder.poll(&mut input) {
                    Ok(ChunkDecodeOutcome::Message(message)) => {
                        if !input.is_empty() {
                            state.ring.unread(&input);
                        }
                        break message;
                    }
                    Ok(ChunkDecodeOutcome::NeedMore) => state.ring.unread(&input),
                    Err(e) => return Err(e.into()),
                }
            }
            let n = state.ring.fill().await?;
            if n == 0 {
                return Err(BoltError::Transport {
                    code: bolt_wire::ErrorCode::TransportClosed,
                    detail: "peer closed connection".into(),
                });
            }
        };
        drop(state);

        let len = body.len();
        let mut bytes = Bytes::from(body);
        let (signature, argv) = decode_message_body(&mut bytes, self.version)?;
        Ok((Message::new(signature, argv), len))
    }
}
