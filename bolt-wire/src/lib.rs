//! Spec-level wire types for the Bolt protocol engine: the [`Value`] tree,
//! graph-shaped values ([`Node`], [`Relationship`], [`Path`]), v2 temporal
//! and spatial payloads, message envelopes, and the shared error taxonomy.
//!
//! This crate has no I/O and no async runtime dependency — it's the
//! vocabulary `bolt-codec` encodes/decodes and `bolt-session` passes
//! around, kept free of both so either can be tested (or replaced) without
//! dragging the other along.

pub mod error;
pub mod graph;
pub mod message;
pub mod temporal;
pub mod value;
pub mod version;

pub use error::{BoltError, ErrorCode, FailureDetails};
pub use graph::{Node, Path, RelEndpoints, Relationship, UnboundRelationship};
pub use message::{Message, Signature};
pub use temporal::{Date, DateTime, Duration, LocalDateTime, LocalTime, Point2D, Point3D, Time, Zone};
pub use value::{PropMap, Value, ValueError, ValueType};
pub use version::BoltVersion;
