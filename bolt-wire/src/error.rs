//! The error taxonomy shared across the wire, codec, I/O, and session
//! layers (§7). Grouped the way `src/dispatch.rs`'s `DispatchError` is:
//! one flat enum per concern, manual `Display`/`Error`, stable numeric
//! codes callers can match on without depending on message text.

use std::fmt;

use crate::value::ValueError;

/// A stable numeric code for each [`BoltError`] variant. Kept separate from
/// the `Display` text so a caller can match on the code without string
/// comparison — the message text is free to change wording across
/// versions, the code is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    HandshakeNoAgreement,
    HandshakeUnexpectedEof,
    ProtocolViolation,
    ChunkTooLarge,
    MessageTooLarge,
    UnknownSignature,
    WrongArgc,
    StatementFailed,
    AuthenticationFailed,
    AuthenticationRateLimited,
    TransportClosed,
    TransportIo,
    SessionResetInProgress,
    SessionPoisoned,
    QueueExhausted,
    ValueConstruction,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::HandshakeNoAgreement => "handshake_no_agreement",
            ErrorCode::HandshakeUnexpectedEof => "handshake_unexpected_eof",
            ErrorCode::ProtocolViolation => "protocol_violation",
            ErrorCode::ChunkTooLarge => "chunk_too_large",
            ErrorCode::MessageTooLarge => "message_too_large",
            ErrorCode::UnknownSignature => "unknown_signature",
            ErrorCode::WrongArgc => "wrong_argc",
            ErrorCode::StatementFailed => "statement_failed",
            ErrorCode::AuthenticationFailed => "authentication_failed",
            ErrorCode::AuthenticationRateLimited => "authentication_rate_limited",
            ErrorCode::TransportClosed => "transport_closed",
            ErrorCode::TransportIo => "transport_io",
            ErrorCode::SessionResetInProgress => "session_reset_in_progress",
            ErrorCode::SessionPoisoned => "session_poisoned",
            ErrorCode::QueueExhausted => "queue_exhausted",
            ErrorCode::ValueConstruction => "value_construction",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a statement failure inside its source text, parsed out of a
/// server `FAILURE` message's free-text `message` field when present.
/// Neo4j appends `(line L, column C (offset O))`-shaped suffixes to
/// statement-syntax failures, sometimes followed by a quoted source snippet
/// and a caret line (`"MATCH x "` / `     ^`); the server never ships any of
/// this as structured metadata, so it's recovered here instead of trusted
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetails {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
    /// The human-readable message text, or the quoted source snippet when
    /// the failure carried one (see `context_offset`).
    pub context: String,
    /// Zero-based index of the `^` marker within `context`, when the
    /// message included a quoted-snippet-plus-caret block.
    pub context_offset: Option<u32>,
}

impl FailureDetails {
    /// Parse a server failure message's embedded position group, of the
    /// form `(line 3, column 5 (offset: 42))`, optionally followed by a
    /// `"<snippet>"` line and a `   ^` caret line pinpointing the column
    /// within the snippet. Returns `None` if the message carries no such
    /// group (most failures don't).
    pub fn parse(message: &str) -> Option<FailureDetails> {
        let marker = message.find("(line ")?;
        let rest = &message[marker..];

        // Walk the group's balanced parens by hand rather than assuming
        // it's the last `(...)` in the message -- trailing snippet/caret
        // lines can themselves contain no parens, but a defensive parser
        // shouldn't rely on that.
        let mut depth = 0i32;
        let mut end = None;
        for (i, c) in rest.char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i + 1);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end?;
        let inner = rest[1..end - 1].to_string();
        let tail = &rest[end..];

        let mut parts = inner.split(',');
        let line: u32 = parts.next()?.trim().strip_prefix("line ")?.trim().parse().ok()?;
        let rest2 = parts.next()?.trim();
        let (column_part, offset_part) = rest2.split_once('(')?;
        let column: u32 = column_part.trim().strip_prefix("column ")?.trim().parse().ok()?;
        let offset: u32 = offset_part
            .trim()
            .trim_end_matches(')')
            .strip_prefix("offset: ")
            .or_else(|| offset_part.trim().trim_end_matches(')').strip_prefix("offset "))?
            .trim()
            .parse()
            .ok()?;

        if let Some((context, context_offset)) = parse_snippet_and_caret(tail) {
            return Some(FailureDetails {
                line,
                column,
                offset,
                context,
                context_offset: Some(context_offset),
            });
        }

        let context = message[..marker].trim_end().to_string();
        Some(FailureDetails {
            line,
            column,
            offset,
            context,
            context_offset: None,
        })
    }
}

/// Parse a `\n"<snippet>"\n<spaces>^` block trailing the position group, as
/// emitted for syntax errors. Returns `(snippet, caret_index)`; the caret
/// column is relative to the *quoted* line (which carries a leading `"` the
/// unquoted `snippet` doesn't), so it's shifted back by one to index into
/// `snippet` instead.
fn parse_snippet_and_caret(tail: &str) -> Option<(String, u32)> {
    let mut lines = tail.split('\n').filter(|l| !l.is_empty());
    let quoted = lines.next()?.trim();
    let snippet = quoted.strip_prefix('"')?.strip_suffix('"')?;
    let caret_line = lines.next()?;
    let caret_index = caret_line.find('^')?;
    Some((snippet.to_string(), caret_index.saturating_sub(1) as u32))
}

/// The single error type threaded through `bolt-wire`, `bolt-codec`,
/// `bolt-io`, and `bolt-session`. Each layer only ever constructs the
/// variants relevant to it; callers match on [`ErrorCode`] rather than on
/// the enum shape when they need to branch.
#[derive(Debug, Clone)]
pub enum BoltError {
    /// No handshake candidate the client proposed was acceptable to the
    /// server (it replied with version `0`).
    HandshakeNoAgreement,
    /// The peer closed the connection mid-handshake.
    HandshakeUnexpectedEof,
    /// A message or value violated the wire grammar in a way not covered
    /// by a more specific variant (bad marker byte, truncated struct, ...).
    Protocol { code: ErrorCode, detail: String },
    /// A `RUN`/pipelined statement failed; `details` is populated when the
    /// failure message carried a parseable source position.
    Statement {
        code: String,
        message: String,
        details: Option<FailureDetails>,
    },
    /// `INIT` failed, or the configured auth-reattempt callback exhausted
    /// its retries.
    Authentication { message: String, rate_limited: bool },
    /// The underlying byte stream closed or failed.
    Transport { code: ErrorCode, detail: String },
    /// The session couldn't accept the operation (reset in progress,
    /// poisoned by an earlier unrecovered failure, or the request queue is
    /// full).
    Resource(ErrorCode),
    /// A `Value`/`Node`/`Relationship`/`Path` constructor rejected its
    /// arguments.
    Value(ValueError),
}

impl BoltError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BoltError::HandshakeNoAgreement => ErrorCode::HandshakeNoAgreement,
            BoltError::HandshakeUnexpectedEof => ErrorCode::HandshakeUnexpectedEof,
            BoltError::Protocol { code, .. } => *code,
            BoltError::Statement { .. } => ErrorCode::StatementFailed,
            BoltError::Authentication { rate_limited, .. } => {
                if *rate_limited {
                    ErrorCode::AuthenticationRateLimited
                } else {
                    ErrorCode::AuthenticationFailed
                }
            }
            BoltError::Transport { code, .. } => *code,
            BoltError::Resource(code) => *code,
            BoltError::Value(_) => ErrorCode::ValueConstruction,
        }
    }
}

impl fmt::Display for BoltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoltError::HandshakeNoAgreement => write!(f, "no mutually acceptable Bolt version"),
            BoltError::HandshakeUnexpectedEof => write!(f, "connection closed during handshake"),
            BoltError::Protocol { code, detail } => write!(f, "protocol violation ({code}): {detail}"),
            BoltError::Statement { code, message, .. } => write!(f, "statement failed [{code}]: {message}"),
            BoltError::Authentication { message, rate_limited } => {
                if *rate_limited {
                    write!(f, "authentication rate limited: {message}")
                } else {
                    write!(f, "authentication failed: {message}")
                }
            }
            BoltError::Transport { code, detail } => write!(f, "transport error ({code}): {detail}"),
            BoltError::Resource(code) => write!(f, "resource error: {code}"),
            BoltError::Value(e) => write!(f, "value error: {e}"),
        }
    }
}

impl std::error::Error for BoltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoltError::Value(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValueError> for BoltError {
    fn from(e: ValueError) -> Self {
        BoltError::Value(e)
    }
}
