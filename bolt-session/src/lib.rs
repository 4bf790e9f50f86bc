//! The pipelined request/response engine (§4.6-§4.9): whole messages over
//! `bolt-codec`/`bolt-io`, typed metadata extraction, the request queue with
//! pipelining/failure-cascade/reset semantics, and the lazy result stream.
//!
//! This is the crate that ties the lower layers together into something a
//! caller can actually drive a Cypher statement through; `bolt-client` only
//! adds the public-facing convenience wrappers on top.

pub mod message_layer;
pub mod metadata;
pub mod result_stream;
pub mod session;

pub use message_layer::MessageLayer;
pub use metadata::{classify_auth_failure, extract_failure, StatementPlan, StatementStats, StatementType, SuccessMetadata};
pub use result_stream::{Record, ResultStream};
pub use session::{RunOutcome, Session, SessionConfig, SessionMetrics};
