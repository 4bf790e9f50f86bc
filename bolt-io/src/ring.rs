//! Buffered read/write wrappers over `AsyncRead`/`AsyncWrite` (§4.5).
//!
//! Grounded on the teacher's `StreamTransport`: a single buffer reused
//! across calls instead of an allocation per message, writes coalesced
//! until an explicit flush, reads topped up from the socket only when the
//! buffered bytes run out.

use std::sync::OnceLock;

use bytes::{Buf, BytesMut};
use object_pool::Pool;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use bolt_wire::{BoltError, ErrorCode};

const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Scratch buffers for [`RingReader::fill`], recycled across connections
/// instead of sized fresh (or held live across an `.await`) on every read.
fn scratch_pool() -> &'static Pool<Vec<u8>> {
    static POOL: OnceLock<Pool<Vec<u8>>> = OnceLock::new();
    POOL.get_or_init(|| Pool::new(32, || Vec::with_capacity(DEFAULT_CAPACITY)))
}

/// Buffers outgoing bytes until [`RingWriter::flush`] is called, so a
/// message built from several small `put_*` calls costs one `write_all`
/// instead of many.
pub struct RingWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> RingWriter<W> {
    pub fn new(inner: W) -> Self {
        RingWriter {
            inner,
            buf: BytesMut::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Queue bytes for the next flush. Never touches the socket itself.
    pub fn queue(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write everything queued so far and flush the underlying stream.
    pub async fn flush(&mut self) -> Result<(), BoltError> {
        while !self.buf.is_empty() {
            let n = self
                .inner
                .write(&self.buf)
                .await
                .map_err(|e| transport_io(e))?;
            if n == 0 {
                return Err(BoltError::Transport {
                    code: ErrorCode::TransportClosed,
                    detail: "peer closed connection during write".into(),
                });
            }
            self.buf.advance(n);
        }
        self.inner.flush().await.map_err(transport_io)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads from the socket in `DEFAULT_CAPACITY`-sized gulps and hands back
/// whatever's buffered; callers (the chunk decoder) drain it incrementally
/// and ask for more only once it's empty.
pub struct RingReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> RingReader<R> {
    pub fn new(inner: R) -> Self {
        RingReader {
            inner,
            buf: BytesMut::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Bytes currently buffered and not yet consumed by the caller.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Remove and return the first `n` buffered bytes. Panics if fewer than
    /// `n` bytes are buffered — callers must check [`Self::buffered`] first.
    pub fn take(&mut self, n: usize) -> BytesMut {
        self.buf.split_to(n)
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Prepend bytes the caller took out but didn't fully consume, so the
    /// next read sees them again before anything freshly read off the
    /// socket.
    pub fn unread(&mut self, bytes: &[u8]) {
        let mut combined = BytesMut::with_capacity(bytes.len() + self.buf.len());
        combined.extend_from_slice(bytes);
        combined.extend_from_slice(&self.buf);
        self.buf = combined;
    }

    /// Read more bytes from the socket into the buffer. Returns the number
    /// of bytes read; `0` means the peer closed the connection cleanly.
    pub async fn fill(&mut self) -> Result<usize, BoltError> {
        let mut scratch = scratch_pool().pull(|| Vec::with_capacity(DEFAULT_CAPACITY));
        scratch.resize(DEFAULT_CAPACITY, 0);
        let n = self.inner.read(&mut scratch).await.map_err(transport_io)?;
        self.buf.extend_from_slice(&scratch[..n]);
        Ok(n)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

fn transport_io(e: std::io::Error) -> BoltError {
    BoltError::Transport {
        code: ErrorCode::TransportIo,
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn writer_flush_delivers_all_queued_bytes() {
        let (client, mut server) = duplex(4096);
        let mut writer = RingWriter::new(client);
        writer.queue(b"hello ");
        writer.queue(b"world");
        writer.flush().await.unwrap();

        let mut buf = [0u8; 11];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello world");
    }

    #[tokio::test]
    async fn reader_fill_accumulates_across_calls() {
        let (mut client, server) = duplex(4096);
        client.write_all(b"ab").await.unwrap();
        let mut reader = RingReader::new(server);
        let n = reader.fill().await.unwrap();
        assert_eq!(n, 2);
        assert_eq!(reader.buffered(), b"ab");

        client.write_all(b"cd").await.unwrap();
        reader.fill().await.unwrap();
        assert_eq!(reader.buffered(), b"abcd");

        let taken = reader.take(3);
        assert_eq!(&taken[..], b"abc");
        assert_eq!(reader.buffered(), b"d");
    }
}
