//! Message signatures and the envelope PackStream carries them in.
//!
//! Every Bolt message is a PackStream struct: a 1-byte signature plus a
//! fixed-arity argument list. `Signature` enumerates the ones this engine
//! speaks (§6); `bolt-codec` is the only other crate that needs to know the
//! numeric values, which is why they're `pub(crate)`-free here — codec
//! round-trips signatures through `Signature::from_byte`/`as_byte` rather
//! than matching raw `u8`s itself.

use std::fmt;

use crate::value::Value;

/// A message or struct-value signature byte (§6, plus the struct tags used
/// inside [`crate::graph`] and [`crate::temporal`] values).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signature {
    Init,
    AckFailure,
    Reset,
    Run,
    DiscardAll,
    PullAll,
    Success,
    Record,
    Ignored,
    Failure,
    Node,
    Relationship,
    UnboundRelationship,
    Path,
    Date,
    Time,
    LocalTime,
    DateTimeOffset,
    DateTimeZoneId,
    LocalDateTime,
    Duration,
    Point2D,
    Point3D,
}

impl Signature {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Signature::Init,
            0x0E => Signature::AckFailure,
            0x0F => Signature::Reset,
            0x10 => Signature::Run,
            0x2F => Signature::DiscardAll,
            0x3F => Signature::PullAll,
            0x70 => Signature::Success,
            0x71 => Signature::Record,
            0x7E => Signature::Ignored,
            0x7F => Signature::Failure,
            0x4E => Signature::Node,
            0x52 => Signature::Relationship,
            0x72 => Signature::UnboundRelationship,
            0x50 => Signature::Path,
            0x44 => Signature::Date,
            0x54 => Signature::Time,
            0x74 => Signature::LocalTime,
            0x46 => Signature::DateTimeOffset,
            0x66 => Signature::DateTimeZoneId,
            0x64 => Signature::LocalDateTime,
            0x45 => Signature::Duration,
            0x58 => Signature::Point2D,
            0x59 => Signature::Point3D,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Signature::Init => 0x01,
            Signature::AckFailure => 0x0E,
            Signature::Reset => 0x0F,
            Signature::Run => 0x10,
            Signature::DiscardAll => 0x2F,
            Signature::PullAll => 0x3F,
            Signature::Success => 0x70,
            Signature::Record => 0x71,
            Signature::Ignored => 0x7E,
            Signature::Failure => 0x7F,
            Signature::Node => 0x4E,
            Signature::Relationship => 0x52,
            Signature::UnboundRelationship => 0x72,
            Signature::Path => 0x50,
            Signature::Date => 0x44,
            Signature::Time => 0x54,
            Signature::LocalTime => 0x74,
            Signature::DateTimeOffset => 0x46,
            Signature::DateTimeZoneId => 0x66,
            Signature::LocalDateTime => 0x64,
            Signature::Duration => 0x45,
            Signature::Point2D => 0x58,
            Signature::Point3D => 0x59,
        }
    }

    /// Arity a well-formed message of this signature carries, where fixed.
    /// Struct-value signatures used inside [`Value`] have their own fixed
    /// arities; request/response messages vary only in `Run` (3) and are
    /// otherwise fixed too.
    pub fn expected_argc(self) -> Option<usize> {
        match self {
            Signature::Init => Some(2),
            Signature::AckFailure | Signature::Reset | Signature::DiscardAll | Signature::PullAll => Some(0),
            Signature::Run => Some(2),
            Signature::Success | Signature::Failure => Some(1),
            Signature::Record => Some(1),
            Signature::Ignored => Some(0),
            Signature::Node => Some(3),
            Signature::Relationship => Some(5),
            Signature::UnboundRelationship => Some(3),
            Signature::Path => Some(3),
            Signature::Date => Some(1),
            Signature::Time => Some(2),
            Signature::LocalTime => Some(1),
            Signature::DateTimeOffset | Signature::DateTimeZoneId => Some(3),
            Signature::LocalDateTime => Some(2),
            Signature::Duration => Some(4),
            Signature::Point2D => Some(3),
            Signature::Point3D => Some(4),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.as_byte())
    }
}

/// A decoded protocol message: signature plus its argument list, already
/// PackStream-decoded to [`Value`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub signature: Signature,
    pub argv: Vec<Value>,
}

impl Message {
    pub fn new(signature: Signature, argv: Vec<Value>) -> Self {
        Message { signature, argv }
    }

    pub fn init(client_name: impl Into<Value>, auth: Value) -> Self {
        Message::new(Signature::Init, vec![client_name.into(), auth])
    }

    pub fn run(statement: impl Into<Value>, parameters: Value) -> Self {
        Message::new(Signature::Run, vec![statement.into(), parameters])
    }

    pub fn discard_all() -> Self {
        Message::new(Signature::DiscardAll, Vec::new())
    }

    pub fn pull_all() -> Self {
        Message::new(Signature::PullAll, Vec::new())
    }

    pub fn reset() -> Self {
        Message::new(Signature::Reset, Vec::new())
    }

    pub fn ack_failure() -> Self {
        Message::new(Signature::AckFailure, Vec::new())
    }
}
