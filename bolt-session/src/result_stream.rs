//! The lazy result stream (C9): records arrive from the server one at a
//! time, well after `run()`/`pull_all()` returned, and are handed to the
//! caller only as they're asked for.
//!
//! Each [`Record`] gets its own freshly allocated [`Pool`] (§4.9's
//! `pullAllCallback`: "appends a new record whose owning pool is the
//! current record-pool, swapped for a fresh one") rather than sharing one
//! with the rest of the stream or the session — draining one record's
//! storage can never reach into another live record's, in this stream or
//! any other. `Record`'s `Drop` impl drains that pool the moment the
//! record is no longer reachable (spec: "released when refcount hits
//! zero, at which time the owned pool is drained"), so the idiomatic `while
//! let Some(r) = stream.fetch_next().await? { ... }` loop releases each row
//! as soon as the next iteration's binding replaces it — no accumulation
//! across the life of a long-running pull.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use bolt_pool::{Handle, Pool, PoolError};
use bolt_wire::value::Value;
use bolt_wire::{BoltError, ErrorCode};

use crate::metadata::{StatementPlan, StatementStats, StatementType, SuccessMetadata};

/// One row of a result, plus the field names it shares with every other row
/// in the same stream. Owns a pool with exactly this record's values in it.
pub struct Record {
    fields: Arc<[Arc<str>]>,
    pool: Arc<Mutex<Pool>>,
    handle: Handle<Vec<Value>>,
}

impl Record {
    pub fn field_names(&self) -> &[Arc<str>] {
        &self.fields
    }

    /// Clone of the value at `index`, or `None` if this record was already
    /// released or `index` is out of range.
    pub fn get(&self, index: usize) -> Option<Value> {
        let pool = self.pool.lock();
        pool.get(self.handle).and_then(|row| row.get(index).cloned())
    }

    pub fn get_by_name(&self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|f| &**f == name)?;
        self.get(index)
    }

    /// All values in the row, in field order.
    pub fn values(&self) -> Vec<Value> {
        self.pool.lock().get(self.handle).cloned().unwrap_or_default()
    }

    /// Drop this row's storage now instead of waiting for it to go out of
    /// scope. `Drop` below does the actual draining, so this is just
    /// `drop(self)` spelled out for callers who want to name the operation.
    pub fn release(self) {}
}

impl Drop for Record {
    fn drop(&mut self) {
        self.pool.lock().drain_to(0);
    }
}

pub(crate) enum StreamEvent {
    Record(Vec<Value>),
    Success(SuccessMetadata),
    Failure(BoltError),
    /// The server responded `IGNORED` — a failure earlier in the pipeline
    /// cascaded onto this request before it ever ran.
    Ignored,
}

/// A lazy, pull-based stream of [`Record`]s, backed by a channel the
/// session engine's drive loop feeds as `RECORD`/terminal messages arrive.
pub struct ResultStream {
    fields: Arc<[Arc<str>]>,
    receiver: mpsc::UnboundedReceiver<StreamEvent>,
    peeked: Option<Record>,
    summary: Option<SuccessMetadata>,
    failure: Option<BoltError>,
    exhausted: bool,
    count: usize,
}

impl ResultStream {
    pub(crate) fn new(fields: Arc<[Arc<str>]>, receiver: mpsc::UnboundedReceiver<StreamEvent>) -> Self {
        ResultStream {
            fields,
            receiver,
            peeked: None,
            summary: None,
            failure: None,
            exhausted: false,
            count: 0,
        }
    }

    /// `nFields()` (§4.9).
    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field_name(&self, index: usize) -> Option<&Arc<str>> {
        self.fields.get(index)
    }

    pub fn field_names(&self) -> &[Arc<str>] {
        &self.fields
    }

    /// The terminal `SUCCESS` metadata (stats, plan, bookmark, ...), once
    /// the stream has been fully drained. `None` before that point.
    pub fn summary(&self) -> Option<&SuccessMetadata> {
        self.summary.as_ref()
    }

    /// Whether this stream has already failed (a `FAILURE` or `IGNORED`
    /// response was dispatched to it).
    pub fn check_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.failure.as_ref().map(|e| e.code())
    }

    pub fn error_message(&self) -> Option<String> {
        match self.failure.as_ref()? {
            BoltError::Statement { message, .. } => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn failure_details(&self) -> Option<&bolt_wire::FailureDetails> {
        match self.failure.as_ref()? {
            BoltError::Statement { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Records fetched so far via [`Self::fetch_next`] (a peeked-but-not-yet
    /// fetched record doesn't count).
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn statement_type(&self) -> Option<StatementType> {
        self.summary.as_ref()?.statement_type
    }

    pub fn statement_plan(&self) -> Option<&StatementPlan> {
        self.summary.as_ref()?.plan.as_ref().or(self.summary.as_ref()?.profile.as_ref())
    }

    pub fn update_counts(&self) -> Option<&StatementStats> {
        self.summary.as_ref()?.stats.as_ref()
    }

    pub fn available_after(&self) -> Option<i64> {
        self.summary.as_ref()?.result_available_after_ms
    }

    pub fn consumed_after(&self) -> Option<i64> {
        self.summary.as_ref()?.result_consumed_after_ms
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Detach from the stream: any record still retained is released and
    /// further calls act as if the stream had already ended (§4.9's
    /// `close()`). Idempotent.
    pub fn close(&mut self) {
        self.peeked.take();
        self.receiver.close();
        self.exhausted = true;
    }

    /// Look at the next record without consuming it. A second `peek` (or a
    /// `fetch_next`) returns the same row.
    pub async fn peek(&mut self) -> Result<Option<&Record>, BoltError> {
        if self.peeked.is_none() && !self.exhausted {
            self.peeked = self.advance().await?;
        }
        Ok(self.peeked.as_ref())
    }

    /// Consume and return the next record, or `None` once the stream is
    /// exhausted.
    pub async fn fetch_next(&mut self) -> Result<Option<Record>, BoltError> {
        let record = if let Some(record) = self.peeked.take() {
            Some(record)
        } else if self.exhausted {
            None
        } else {
            self.advance().await?
        };
        if record.is_some() {
            self.count += 1;
        }
        Ok(record)
    }

    async fn advance(&mut self) -> Result<Option<Record>, BoltError> {
        loop {
            return match self.receiver.recv().await {
                Some(StreamEvent::Record(values)) => {
                    // §4.9: each record gets its own fresh pool, not the
                    // stream's — so draining one record's storage can never
                    // touch another record's, in this stream or any other.
                    let mut pool = Pool::new();
                    let (_, handle) = pool.add(values).map_err(pool_exhausted)?;
                    Ok(Some(Record {
                        fields: self.fields.clone(),
                        pool: Arc::new(Mutex::new(pool)),
                        handle,
                    }))
                }
                Some(StreamEvent::Success(meta)) => {
                    self.summary = Some(meta);
                    self.exhausted = true;
                    Ok(None)
                }
                Some(StreamEvent::Failure(err)) => {
                    self.exhausted = true;
                    self.failure = Some(err.clone());
                    Err(err)
                }
                Some(StreamEvent::Ignored) => {
                    self.exhausted = true;
                    let err = BoltError::Resource(ErrorCode::SessionResetInProgress);
                    self.failure = Some(err.clone());
                    Err(err)
                }
                None => {
                    self.exhausted = true;
                    Ok(None)
                }
            };
        }
    }
}

fn pool_exhausted(_: PoolError) -> BoltError {
    BoltError::Resource(ErrorCode::QueueExhausted)
}
