//! PackStream value codec and chunked message framing (§4.4, §6).
//!
//! This crate is pure encode/decode: no I/O, no session state. `bolt-io`
//! drives [`framing::ChunkDecoder`] against a live socket; `bolt-session`
//! drives [`packstream::decode`]/[`packstream::encode`] against the
//! reassembled message bytes.

pub mod error;
pub mod framing;
pub mod packstream;

pub use error::CodecError;
pub use framing::{ChunkDecodeOutcome, ChunkDecoder, MAX_CHUNK_SIZE};
pub use packstream::{decode, decode_message_body, encode, encode_message_body};
