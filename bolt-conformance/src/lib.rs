//! A scripted, in-memory Bolt server for driving the seed scenarios (A)-(F)
//! end to end, the way `rust-legacy/rapace-core/tests/transport_conformance.rs`
//! drives its `run_*` scenarios over a `tokio::io::duplex` pair instead of a
//! real socket.
//!
//! This crate has no public API beyond the harness below; it exists purely
//! so `tests/conformance.rs` can assemble canned server responses without
//! hand-rolling the handshake/framing/encoding boilerplate in every test.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};

use bolt_codec::framing::encode_message;
use bolt_codec::packstream::encode_message_body;
use bolt_wire::value::Value;
use bolt_wire::{BoltVersion, Signature};

/// Ensure `tracing` output is visible under `cargo test -- --nocapture`
/// without every test repeating the subscriber boilerplate.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// One side of a scripted client/server pair: a plain `tokio::io::duplex`
/// byte stream, same as a real `AsyncRead + AsyncWrite` socket would be.
pub fn stream_pair(capacity: usize) -> (DuplexStream, DuplexStream) {
    tokio::io::duplex(capacity)
}

/// Append one whole message (chunked, PackStream-encoded) to `buf`.
pub fn script_message(buf: &mut Vec<u8>, signature: Signature, argv: &[Value], version: BoltVersion) {
    let mut body = BytesMut::new();
    encode_message_body(signature, argv, version, &mut body).expect("scripted message must encode");
    let mut framed = BytesMut::new();
    encode_message(&body, bolt_codec::MAX_CHUNK_SIZE, &mut framed);
    buf.extend_from_slice(&framed);
}

/// Play the server side of the Bolt handshake (§6): read the magic plus
/// four candidate versions, reply with `chosen`.
pub async fn server_handshake(server: &mut (impl AsyncRead + AsyncWrite + Unpin), chosen: BoltVersion) {
    let mut magic = [0u8; 4];
    server.read_exact(&mut magic).await.expect("client must send handshake magic");
    assert_eq!(magic, bolt_io::HANDSHAKE_MAGIC);
    let mut candidates = [0u8; 16];
    server.read_exact(&mut candidates).await.expect("client must send four candidates");
    server
        .write_all(&chosen.to_handshake().to_be_bytes())
        .await
        .expect("server must be able to write its chosen version");
}

/// Read and discard exactly `n` bytes the client has already written —
/// enough to know a request landed without decoding it, mirroring how the
/// session engine tests drain pipelined RUN/PULL_ALL pairs.
pub async fn drain(server: &mut (impl AsyncRead + Unpin), n: usize) {
    let mut scratch = vec![0u8; n];
    server.read_exact(&mut scratch).await.expect("expected client bytes were not written");
}
