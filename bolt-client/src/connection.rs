//! The public-facing wrapper around [`bolt_session::Session`]: connection
//! setup with auth-reattempt support, plus the `begin`/`commit`/`rollback`
//! convenience methods real callers expect and spec.md's DATA MODEL never
//! mentions because Bolt v1/v2 has no dedicated transaction messages.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};

use bolt_session::{ResultStream, RunOutcome, Session, SessionConfig, SessionMetrics, SuccessMetadata};
use bolt_wire::value::Value;
use bolt_wire::BoltError;

use crate::auth::{Auth, AuthAction, AuthReattempt};

/// A live, authenticated Bolt connection — `bolt_session::Session` plus the
/// conveniences a caller actually wants at the top of their code: named
/// auth, transaction helpers, and auth-retry.
pub struct Connection<R, W> {
    session: Session<R, W>,
}

impl<R, W> Clone for Connection<R, W> {
    fn clone(&self) -> Self {
        Connection {
            session: self.session.clone(),
        }
    }
}

impl<S> Connection<ReadHalf<S>, WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Connect once with a single stream and no retry. For most callers,
    /// who already have a connected socket, this is all that's needed.
    pub async fn connect(stream: S, auth: Auth, config: SessionConfig) -> Result<(Self, SuccessMetadata), BoltError> {
        let mut config = config;
        config.auth = auth.to_prop_map();
        let (session, meta) = Session::connect(stream, config).await?;
        Ok((Connection { session }, meta))
    }

    /// Connect with the auth-reattempt callback (§6): on an authentication
    /// failure, `reattempt` decides whether to retry with different
    /// credentials over a freshly dialed stream (`new_stream`, called once
    /// per attempt since the server closes the connection after a failed
    /// `INIT`) or give up. Connecting/dialing TCP or TLS is the caller's
    /// responsibility — `new_stream` just has to produce the next byte
    /// stream to hand to the handshake.
    pub async fn connect_with_reattempt<F, Fut>(
        host: &str,
        mut new_stream: F,
        mut auth: Auth,
        config: SessionConfig,
        reattempt: &dyn AuthReattempt,
    ) -> Result<(Self, SuccessMetadata), BoltError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S, BoltError>>,
    {
        let mut attempt = 0u32;
        loop {
            let stream = new_stream().await?;
            match Self::connect(stream, auth.clone(), config.clone()).await {
                Ok(result) => return Ok(result),
                Err(err) if matches!(err, BoltError::Authentication { .. }) => {
                    attempt += 1;
                    match reattempt.reattempt(host, attempt, &err) {
                        AuthAction::Retry(next_auth) => {
                            tracing::debug!(host, attempt, "retrying INIT with new credentials");
                            auth = next_auth;
                        }
                        AuthAction::GiveUp => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn is_poisoned(&self) -> bool {
        self.session.is_poisoned()
    }

    pub fn is_reset_in_progress(&self) -> bool {
        self.session.is_reset_in_progress()
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.session.metrics()
    }

    pub async fn run(&self, statement: impl Into<Value>, parameters: Value) -> Result<RunOutcome, BoltError> {
        self.session.run(statement, parameters).await
    }

    pub async fn pull_all(&self, fields: std::sync::Arc<[std::sync::Arc<str>]>) -> Result<ResultStream, BoltError> {
        self.session.pull_all(fields).await
    }

    pub async fn discard_all(&self) -> Result<SuccessMetadata, BoltError> {
        self.session.discard_all().await
    }

    pub async fn ack_failure(&self) -> Result<(), BoltError> {
        self.session.ack_failure().await
    }

    pub async fn reset(&self) -> Result<(), BoltError> {
        self.session.reset().await
    }

    /// `BEGIN` a transaction — not a distinct Bolt v1/v2 message, just a
    /// `RUN` whose statement text the server recognizes as reserved.
    pub async fn begin(&self) -> Result<SuccessMetadata, BoltError> {
        self.run_to_completion("BEGIN").await
    }

    pub async fn commit(&self) -> Result<SuccessMetadata, BoltError> {
        self.run_to_completion("COMMIT").await
    }

    pub async fn rollback(&self) -> Result<SuccessMetadata, BoltError> {
        self.run_to_completion("ROLLBACK").await
    }

    async fn run_to_completion(&self, statement: &'static str) -> Result<SuccessMetadata, BoltError> {
        let outcome = self.session.run(statement, Value::Null).await?;
        let meta = outcome.await_fields().await?;
        // BEGIN/COMMIT/ROLLBACK return no rows; PULL_ALL still has to be
        // sent so the session's request queue doesn't wait on a response
        // that will never come for a request nobody issued.
        self.session.discard_all().await?;
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolt_codec::framing::encode_message;
    use bolt_codec::packstream::encode_message_body;
    use bolt_wire::value::PropMap;
    use bolt_wire::{BoltVersion, Signature};
    use bytes::BytesMut;
    use std::sync::Arc;
    use tokio::io::duplex;

    fn server_send(buf: &mut Vec<u8>, signature: Signature, argv: &[Value]) {
        let mut body = BytesMut::new();
        encode_message_body(signature, argv, BoltVersion::V2, &mut body).unwrap();
        let mut framed = BytesMut::new();
        encode_message(&body, bolt_codec::MAX_CHUNK_SIZE, &mut framed);
        buf.extend_from_slice(&framed);
    }

    async fn server_handshake_response(server: &mut (impl AsyncRead + AsyncWrite + Unpin)) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut magic = [0u8; 4];
        server.read_exact(&mut magic).await.unwrap();
        let mut candidates = [0u8; 16];
        server.read_exact(&mut candidates).await.unwrap();
        server.write_all(&2u32.to_be_bytes()).await.unwrap();
    }

    #[tokio::test]
    async fn connect_sends_auth_map_in_init() {
        let (client_io, mut server_io) = duplex(8192);

        let server_task = tokio::spawn(async move {
            server_handshake_response(&mut server_io).await;
            use tokio::io::AsyncWriteExt;
            let mut response = Vec::new();
            server_send(&mut response, Signature::Success, &[Value::Map(PropMap::empty())]);
            server_io.write_all(&response).await.unwrap();
            server_io
        });

        let auth = Auth::basic("neo4j", "s3cret");
        let (connection, _meta) = Connection::connect(client_io, auth, SessionConfig::default()).await.unwrap();
        assert!(!connection.is_poisoned());

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn begin_commit_round_trip_through_run_and_discard() {
        let (client_io, mut server_io) = duplex(16384);

        let server_task = tokio::spawn(async move {
            server_handshake_response(&mut server_io).await;
            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            let mut init_response = Vec::new();
            server_send(&mut init_response, Signature::Success, &[Value::Map(PropMap::empty())]);
            server_io.write_all(&init_response).await.unwrap();

            // BEGIN: RUN + ack it, then DISCARD_ALL + ack it.
            let mut scratch = [0u8; 4096];
            let _ = server_io.read(&mut scratch).await.unwrap();
            let mut response = Vec::new();
            server_send(&mut response, Signature::Success, &[Value::Map(PropMap::empty())]);
            server_send(&mut response, Signature::Success, &[Value::Map(PropMap::empty())]);
            server_io.write_all(&response).await.unwrap();
            server_io
        });

        let (connection, _meta) = Connection::connect(client_io, Auth::none(), SessionConfig::default())
            .await
            .unwrap();
        connection.begin().await.unwrap();

        server_task.await.unwrap();
    }

    struct AlwaysRetryOnce {
        retried: std::sync::atomic::AtomicBool,
    }

    impl AuthReattempt for AlwaysRetryOnce {
        fn reattempt(&self, _host: &str, attempt: u32, _prior_error: &BoltError) -> AuthAction {
            if attempt == 1 && !self.retried.swap(true, std::sync::atomic::Ordering::SeqCst) {
                AuthAction::Retry(Auth::basic("neo4j", "correct-password"))
            } else {
                AuthAction::GiveUp
            }
        }
    }

    #[tokio::test]
    async fn connect_with_reattempt_retries_once_on_auth_failure_then_succeeds() {
        let mut streams = vec![duplex(8192), duplex(8192)];
        let (client_first, mut server_first) = streams.remove(0);
        let (client_second, mut server_second) = streams.remove(0);

        let server_task = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;

            server_handshake_response(&mut server_first).await;
            let mut failure = Vec::new();
            let failure_map = Value::Map(PropMap::new(vec![
                (Arc::from("code"), Value::from("Neo.ClientError.Security.Unauthorized")),
                (Arc::from("message"), Value::from("wrong password")),
            ]));
            server_send(&mut failure, Signature::Failure, &[failure_map]);
            server_first.write_all(&failure).await.unwrap();

            server_handshake_response(&mut server_second).await;
            let mut success = Vec::new();
            server_send(&mut success, Signature::Success, &[Value::Map(PropMap::empty())]);
            server_second.write_all(&success).await.unwrap();
        });

        let mut attempts = vec![Some(client_first), Some(client_second)].into_iter();
        let reattempt = AlwaysRetryOnce {
            retried: std::sync::atomic::AtomicBool::new(false),
        };

        let (connection, _meta) = Connection::connect_with_reattempt(
            "localhost",
            move || {
                let stream = attempts.next().flatten().expect("only two attempts expected");
                async move { Ok::<_, BoltError>(stream) }
            },
            Auth::basic("neo4j", "wrong-password"),
            SessionConfig::default(),
            &reattempt,
        )
        .await
        .unwrap();

        assert!(!connection.is_poisoned());
        server_task.await.unwrap();
    }
}
