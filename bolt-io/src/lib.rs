//! Buffered async I/O and the Bolt handshake/transport built on top of it
//! (§4.5, §6). No protocol semantics beyond framing live here — message
//! contents are opaque byte blobs as far as this crate is concerned;
//! `bolt-session` is the layer that knows what's inside them.

pub mod ring;
pub mod transport;

pub use ring::{RingReader, RingWriter};
pub use transport::{BoltTransport, HANDSHAKE_MAGIC};
