use std::fmt;

use bolt_wire::{BoltError, ErrorCode};

/// A codec-layer failure: a malformed value or chunk stream, tagged with
/// the stable [`ErrorCode`] so callers don't have to match on message text.
#[derive(Debug, Clone)]
pub struct CodecError {
    pub code: ErrorCode,
    pub detail: String,
}

impl CodecError {
    /// Construct a codec error, logging the malformed-input diagnostic at
    /// `debug` before it's surfaced to the caller as a `ProtocolError`
    /// (§4.7: "every missing/mistyped field yields `ProtocolError` with a
    /// logged diagnostic").
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::debug!(code = %code, detail = %detail, "malformed Bolt wire input");
        CodecError { code, detail }
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.detail)
    }
}

impl std::error::Error for CodecError {}

impl From<CodecError> for BoltError {
    fn from(e: CodecError) -> Self {
        BoltError::Protocol {
            code: e.code,
            detail: e.detail,
        }
    }
}
