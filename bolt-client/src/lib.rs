//! The public façade over the Bolt protocol engine: a `Connection` wrapping
//! `bolt_session::Session` with named auth, auth-reattempt support, and the
//! `begin`/`commit`/`rollback` convenience methods a real client library
//! needs on top of the bare RUN/PULL_ALL/DISCARD_ALL primitives.
//!
//! Everything below `Connection` — the value model, the codec, the session
//! engine — lives one layer down in `bolt-session` and is re-exported here
//! so most callers only need this one crate.

mod auth;
mod connection;

pub use auth::{Auth, AuthAction, AuthReattempt, NoReattempt};
pub use connection::Connection;

pub use bolt_session::{Record, ResultStream, RunOutcome, Session, SessionConfig, SessionMetrics, StatementPlan, StatementStats, StatementType, SuccessMetadata};
pub use bolt_wire::value::{PropMap, Value, ValueError};
pub use bolt_wire::{BoltError, BoltVersion, ErrorCode, FailureDetails};

/// Prelude for the common case: `use bolt_client::prelude::*;`
pub mod prelude {
    pub use crate::{Auth, Connection};
    pub use bolt_wire::params;
    pub use bolt_wire::value::Value;
}
