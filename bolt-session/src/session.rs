//! The session engine (C8): a pipelined request queue over one connection.
//!
//! Callers enqueue `RUN`/`PULL_ALL`/`DISCARD_ALL` without waiting for each
//! one's response before sending the next — [`Session::run`] and
//! [`Session::pull_all`] both return as soon as their message is written,
//! handing back a handle the caller awaits only when it actually needs the
//! data. A single background "drive loop" reads responses off the wire in
//! FIFO order and fans them out to whichever handle is waiting; the two
//! atomics below keep that loop singly-owned and interruptible.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

use bolt_io::ring::{RingReader, RingWriter};
use bolt_io::BoltTransport;
use bolt_wire::value::{PropMap, Value};
use bolt_wire::{BoltError, BoltVersion, ErrorCode, Message, Signature};

use crate::message_layer::MessageLayer;
use crate::metadata::{classify_auth_failure, extract_failure, SuccessMetadata};
use crate::result_stream::{ResultStream, StreamEvent};

/// Credentials and connection-time settings carried by `INIT` and the
/// handshake that precedes it.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub client_name: String,
    pub auth: PropMap,
    /// §4.4's `snd_max_chunk_size`: a chunk is emitted once the send buffer
    /// would exceed this many bytes (clamped to the wire's `u16` ceiling).
    pub max_chunk_size: usize,
    /// Ceiling on one reassembled inbound message (§4.4), independent of
    /// the chunk size that produced it.
    pub max_message_size: usize,
    /// §4.8: how many requests may be inflight (sent, response not yet
    /// dispatched) at once. `Session::submit` blocks past this many
    /// pipelined requests rather than sending further and running the
    /// request queue unbounded.
    pub max_pipelined_requests: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            client_name: "bolt-client/0.1".into(),
            auth: PropMap::empty(),
            max_chunk_size: bolt_codec::MAX_CHUNK_SIZE,
            max_message_size: 64 * 1024 * 1024,
            max_pipelined_requests: 100,
        }
    }
}

/// Which kind of response a queued entry is waiting for — governs how
/// strictly `dispatch` validates a `SUCCESS`'s metadata (§4.7): a `RUN`'s own
/// acknowledgement must carry `fields`, but terminal `SUCCESS`es for
/// `PULL_ALL`/`DISCARD_ALL`/`INIT`/`ACK_FAILURE`/`RESET` legitimately don't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Run,
    Other,
}

type PendingEntry = (mpsc::UnboundedSender<StreamEvent>, OwnedSemaphorePermit, RequestKind);

/// A point-in-time snapshot of a session's traffic counters (supplemented
/// ambient observability — not excluded by any Non-goal, which only rules
/// out a logging *backend*).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionMetrics {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub requests_enqueued: u64,
    pub requests_completed: u64,
}

#[derive(Default)]
struct Counters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    requests_enqueued: AtomicU64,
    requests_completed: AtomicU64,
}

struct Inner<R, W> {
    layer: MessageLayer<R, W>,
    queue: Mutex<VecDeque<PendingEntry>>,
    pipeline: Arc<Semaphore>,
    processing: AtomicBool,
    reset_requested: AtomicBool,
    poisoned: AtomicBool,
    counters: Counters,
}

/// A live, authenticated Bolt connection.
pub struct Session<R, W> {
    inner: Arc<Inner<R, W>>,
}

impl<R, W> Clone for Session<R, W> {
    fn clone(&self) -> Self {
        Session {
            inner: self.inner.clone(),
        }
    }
}

/// Best-effort teardown for a `Session` dropped without an explicit
/// `reset()`: the last clone to go fires a `RESET` onto the wire and moves
/// on, matching the libneo4j-client original's close-on-drop behavior
/// (§4.8). Failure to send is swallowed — there's no caller left to hand
/// the error to.
impl<R, W> Drop for Session<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) != 1 {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let inner = self.inner.clone();
            handle.spawn(async move {
                let _ = inner.layer.send(&Message::reset()).await;
            });
        }
    }
}

/// What a `RUN` request's own acknowledgement carries: either the field
/// names the subsequent pull will stream rows for, or the failure that
/// means there won't be any rows at all.
pub struct RunOutcome {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl RunOutcome {
    pub async fn await_fields(mut self) -> Result<SuccessMetadata, BoltError> {
        match self.rx.recv().await {
            Some(StreamEvent::Success(meta)) => Ok(meta),
            Some(StreamEvent::Failure(err)) => Err(err),
            Some(StreamEvent::Ignored) => Err(BoltError::Resource(ErrorCode::SessionResetInProgress)),
            Some(StreamEvent::Record(_)) | None => Err(protocol_violation("RUN produced no terminal response")),
        }
    }
}

pub(crate) fn protocol_violation(detail: impl Into<String>) -> BoltError {
    BoltError::Protocol {
        code: ErrorCode::ProtocolViolation,
        detail: detail.into(),
    }
}

impl<S> Session<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Perform the handshake, send `INIT`, and return the session together
    /// with the server's `INIT` response metadata.
    pub async fn connect(stream: S, config: SessionConfig) -> Result<(Self, SuccessMetadata), BoltError> {
        let mut transport = BoltTransport::new(stream, config.max_message_size);
        transport.set_max_chunk_size(config.max_chunk_size);
        let version = transport.client_handshake().await?;
        let (ring, writer) = transport.into_parts();

        let mut layer = MessageLayer::from_parts(ring, writer, version, config.max_message_size);
        layer.set_max_chunk_size(config.max_chunk_size);

        let session = Session {
            inner: Arc::new(Inner {
                layer,
                queue: Mutex::new(VecDeque::new()),
                pipeline: Arc::new(Semaphore::new(config.max_pipelined_requests.max(1))),
                processing: AtomicBool::new(false),
                reset_requested: AtomicBool::new(false),
                poisoned: AtomicBool::new(false),
                counters: Counters::default(),
            }),
        };

        let init_msg = Message::init(config.client_name.as_str(), Value::Map(config.auth));
        let rx = session.submit(init_msg, RequestKind::Other).await?;
        let meta = RunOutcome { rx }.await_fields().await?;
        Ok((session, meta))
    }
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn is_poisoned(&self) -> bool {
        self.inner.poisoned.load(Ordering::Acquire)
    }

    pub fn is_reset_in_progress(&self) -> bool {
        self.inner.reset_requested.load(Ordering::Acquire)
    }

    /// A snapshot of this session's traffic counters.
    pub fn metrics(&self) -> SessionMetrics {
        SessionMetrics {
            bytes_sent: self.inner.counters.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.inner.counters.bytes_received.load(Ordering::Relaxed),
            requests_enqueued: self.inner.counters.requests_enqueued.load(Ordering::Relaxed),
            requests_completed: self.inner.counters.requests_completed.load(Ordering::Relaxed),
        }
    }

    /// Queue a `RUN`. Returns as soon as the message is written — call
    /// [`RunOutcome::await_fields`] to block on its response, and
    /// [`Session::pull_all`]/[`Session::discard_all`] right after `run`
    /// without awaiting it first to pipeline both onto the wire together.
    pub async fn run(&self, statement: impl Into<Value>, parameters: Value) -> Result<RunOutcome, BoltError> {
        self.check_usable()?;
        let rx = self.submit(Message::run(statement, parameters), RequestKind::Run).await?;
        Ok(RunOutcome { rx })
    }

    /// Queue a `PULL_ALL`. `fields` should be whatever the matching
    /// `RunOutcome::await_fields` reported (or awaited afterwards,
    /// concurrently with the pull).
    pub async fn pull_all(&self, fields: Arc<[Arc<str>]>) -> Result<ResultStream, BoltError> {
        self.check_usable()?;
        let rx = self.submit(Message::pull_all(), RequestKind::Other).await?;
        Ok(ResultStream::new(fields, rx))
    }

    /// Queue a `DISCARD_ALL`, returning its terminal metadata once the
    /// server finishes discarding the pending result.
    pub async fn discard_all(&self) -> Result<SuccessMetadata, BoltError> {
        self.check_usable()?;
        let rx = self.submit(Message::discard_all(), RequestKind::Other).await?;
        RunOutcome { rx }.await_fields().await
    }

    /// Clear a single failed statement without discarding the whole
    /// session: acknowledges the `FAILURE` so the server resumes normal
    /// processing of subsequently queued requests.
    pub async fn ack_failure(&self) -> Result<(), BoltError> {
        let rx = self.submit(Message::ack_failure(), RequestKind::Other).await?;
        RunOutcome { rx }.await_fields().await?;
        self.inner.poisoned.store(false, Ordering::Release);
        Ok(())
    }

    /// Cancel every request still queued and reset the connection to a
    /// clean state. Safe to call from a different task than the one
    /// driving a long-running pull — the message layer's reader and writer
    /// are independently locked, so `RESET` goes out over the wire even
    /// while that pull is still blocked waiting on the next chunk.
    pub async fn reset(&self) -> Result<(), BoltError> {
        self.inner.reset_requested.store(true, Ordering::Release);
        let result = async {
            let rx = self.submit(Message::reset(), RequestKind::Other).await?;
            RunOutcome { rx }.await_fields().await
        }
        .await;
        self.inner.reset_requested.store(false, Ordering::Release);
        self.inner.poisoned.store(false, Ordering::Release);
        result.map(|_| ())
    }

    fn check_usable(&self) -> Result<(), BoltError> {
        if self.inner.reset_requested.load(Ordering::Acquire) {
            return Err(BoltError::Resource(ErrorCode::SessionResetInProgress));
        }
        if self.inner.poisoned.load(Ordering::Acquire) {
            return Err(BoltError::Resource(ErrorCode::SessionPoisoned));
        }
        Ok(())
    }

    async fn submit(
        &self,
        message: Message,
        kind: RequestKind,
    ) -> Result<mpsc::UnboundedReceiver<StreamEvent>, BoltError> {
        // §4.8: at most `max_pipelined_requests` requests may be inflight;
        // further sends block here until an earlier one's terminal
        // response is dispatched and its permit released.
        let permit = self
            .inner
            .pipeline
            .clone()
            .acquire_owned()
            .await
            .expect("pipeline semaphore is never closed");

        let (tx, rx) = mpsc::unbounded_channel();
        let sent = self.inner.layer.send(&message).await?;
        self.inner.counters.bytes_sent.fetch_add(sent as u64, Ordering::Relaxed);
        self.inner.counters.requests_enqueued.fetch_add(1, Ordering::Relaxed);
        self.inner.queue.lock().push_back((tx, permit, kind));
        self.kick_driver();
        Ok(rx)
    }

    /// Run the drive loop under a single-owner flag, re-kicking in place if
    /// a `submit` raced the flag's clear: `drive_loop` returns as soon as it
    /// observes an empty queue, and without this re-check a `submit` that
    /// pushes a new entry and finds `processing` still `true` would give up
    /// on `compare_exchange` just as this task clears it, leaving the new
    /// entry queued with nobody driving it.
    fn kick_driver(&self) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            loop {
                if inner.processing.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
                    return;
                }
                let outcome = inner.drive_loop().await;
                inner.processing.store(false, Ordering::Release);
                if let Err(err) = outcome {
                    tracing::debug!(%err, "session drive loop stopped on error");
                    inner.fail_all_pending(err);
                    return;
                }
                if inner.queue.lock().is_empty() {
                    return;
                }
                // Work arrived between the empty-check inside `drive_loop`
                // and clearing `processing` above -- loop back and re-drive
                // instead of returning with nobody watching the queue.
            }
        });
    }
}

impl<R, W> Inner<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    async fn drive_loop(&self) -> Result<(), BoltError> {
        loop {
            if self.queue.lock().is_empty() {
                return Ok(());
            }
            let (msg, len) = self.layer.recv().await?;
            self.counters.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
            self.dispatch(msg)?;
        }
    }

    fn dispatch(&self, msg: Message) -> Result<(), BoltError> {
        match msg.signature {
            Signature::Record => {
                let row = match msg.argv.into_iter().next() {
                    Some(Value::List(items)) => items.to_vec(),
                    _ => return Err(protocol_violation("RECORD argument must be a List")),
                };
                let queue = self.queue.lock();
                if let Some((tx, _permit, _kind)) = queue.front() {
                    let _ = tx.send(StreamEvent::Record(row));
                }
                Ok(())
            }
            Signature::Success => {
                let arg = msg.argv.into_iter().next().unwrap_or(Value::Null);
                // RUN's own SUCCESS must carry `fields` (§4.7); other
                // terminal SUCCESSes (PULL_ALL/DISCARD_ALL/INIT/ACK_FAILURE/
                // RESET) legitimately don't, so only RUN is validated strictly.
                let kind = self.queue.lock().front().map(|(_, _, kind)| *kind);
                let meta = match kind {
                    Some(RequestKind::Run) => SuccessMetadata::from_run_response(&arg)?,
                    _ => SuccessMetadata::from_value(&arg),
                };
                if let Some((tx, _permit, _kind)) = self.queue.lock().pop_front() {
                    self.counters.requests_completed.fetch_add(1, Ordering::Relaxed);
                    let _ = tx.send(StreamEvent::Success(meta));
                }
                Ok(())
            }
            Signature::Failure => {
                self.poisoned.store(true, Ordering::Release);
                let arg = msg.argv.into_iter().next().unwrap_or(Value::Null);
                let (code, message, details) = extract_failure(&arg)?;
                let err = match classify_auth_failure(&code) {
                    Some(rate_limited) => BoltError::Authentication { message, rate_limited },
                    None => BoltError::Statement { code, message, details },
                };
                if let Some((tx, _permit, _kind)) = self.queue.lock().pop_front() {
                    self.counters.requests_completed.fetch_add(1, Ordering::Relaxed);
                    let _ = tx.send(StreamEvent::Failure(err));
                }
                Ok(())
            }
            Signature::Ignored => {
                if let Some((tx, _permit, _kind)) = self.queue.lock().pop_front() {
                    self.counters.requests_completed.fetch_add(1, Ordering::Relaxed);
                    let _ = tx.send(StreamEvent::Ignored);
                }
                Ok(())
            }
            other => Err(protocol_violation(format!("unexpected message {other} from server"))),
        }
    }

    fn fail_all_pending(&self, err: BoltError) {
        let mut queue = self.queue.lock();
        while let Some((tx, _permit, _kind)) = queue.pop_front() {
            self.counters.requests_completed.fetch_add(1, Ordering::Relaxed);
            let _ = tx.send(StreamEvent::Failure(err.clone()));
        }
    }
}
