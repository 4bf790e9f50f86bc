//! The tagged value tree Bolt results and parameters are built from.
//!
//! The reference design dispatches through a per-instance vtable index; in
//! Rust that collapses to an ordinary `enum` plus `match` (the compiler
//! devirtualizes what the vtable did by hand), which is the translation
//! `spec.md` §9 calls out directly ("Vtable dispatch → tagged enum with
//! methods").

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::graph::{Node, Path, Relationship};
use crate::temporal::{Date, DateTime, Duration, LocalDateTime, LocalTime, Point2D, Point3D, Time};
use crate::version::BoltVersion;

/// Failure modes for value construction (§4.2). Every variant here is a
/// construction-time check; malformed *wire* input that claims to decode
/// into one of these shapes but doesn't typecheck is reported with the same
/// error by `bolt-codec`, which is why this type lives in `bolt-wire`
/// rather than being private to either crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueError {
    InvalidArgument,
    InvalidMapKeyType,
    InvalidLabelType,
    InvalidPathNodeType,
    InvalidPathRelationshipType,
    InvalidPathSequenceLength,
    InvalidPathSequenceIdxType,
    InvalidPathSequenceIdxRange,
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ValueError::InvalidArgument => "invalid argument",
            ValueError::InvalidMapKeyType => "map key is not a string",
            ValueError::InvalidLabelType => "node label is not a string",
            ValueError::InvalidPathNodeType => "path node entry is not a Node",
            ValueError::InvalidPathRelationshipType => "path relationship entry is not an UnboundRelationship",
            ValueError::InvalidPathSequenceLength => "path sequence has odd length",
            ValueError::InvalidPathSequenceIdxType => "path sequence entry is not an integer",
            ValueError::InvalidPathSequenceIdxRange => "path sequence index out of range",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ValueError {}

/// An ordered `String -> Value` map.
///
/// Construction never rejects duplicate keys: a peer is free to send one
/// (nothing on the wire enforces uniqueness), so lookup and equality both
/// apply "first occurrence wins" rather than panicking or erroring on
/// something only detectable after the fact.
#[derive(Debug, Clone)]
pub struct PropMap(Arc<[(Arc<str>, Value)]>);

impl PropMap {
    pub fn new(entries: impl Into<Arc<[(Arc<str>, Value)]>>) -> Self {
        PropMap(entries.into())
    }

    pub fn empty() -> Self {
        PropMap(Arc::from(Vec::new()))
    }

    /// First entry matching `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (&**k, v))
    }

    /// Raw entry count, including any duplicate keys.
    pub fn raw_len(&self) -> usize {
        self.0.len()
    }

    fn effective(&self) -> BTreeMap<&str, &Value> {
        let mut out = BTreeMap::new();
        for (k, v) in self.0.iter() {
            out.entry(&**k).or_insert(v);
        }
        out
    }
}

impl FromIterator<(Arc<str>, Value)> for PropMap {
    fn from_iter<I: IntoIterator<Item = (Arc<str>, Value)>>(iter: I) -> Self {
        PropMap(Arc::from_iter(iter))
    }
}

impl PartialEq for PropMap {
    fn eq(&self, other: &Self) -> bool {
        let a = self.effective();
        let b = other.effective();
        a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|bv| **v == **bv))
    }
}

/// The tagged value tree.
///
/// `Bytes` and every temporal/spatial variant are Bolt v2-only; see
/// [`Value::is_supported`].
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    Bytes(Arc<[u8]>),
    List(Arc<[Value]>),
    Map(PropMap),
    Node(Node),
    Relationship(Relationship),
    Path(Path),
    Point2D(Point2D),
    Point3D(Point3D),
    Duration(Duration),
    Date(Date),
    Time(Time),
    LocalTime(LocalTime),
    DateTime(DateTime),
    LocalDateTime(LocalDateTime),
}

/// The variant tag, independent of payload — `typeOf`/`typeStr` in §4.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    List,
    Map,
    Node,
    Relationship,
    Path,
    Point2D,
    Point3D,
    Duration,
    Date,
    Time,
    LocalTime,
    DateTime,
    LocalDateTime,
}

impl ValueType {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::Null => "Null",
            ValueType::Bool => "Bool",
            ValueType::Int => "Integer",
            ValueType::Float => "Float",
            ValueType::String => "String",
            ValueType::Bytes => "Bytes",
            ValueType::List => "List",
            ValueType::Map => "Map",
            ValueType::Node => "Node",
            ValueType::Relationship => "Relationship",
            ValueType::Path => "Path",
            ValueType::Point2D => "Point2D",
            ValueType::Point3D => "Point3D",
            ValueType::Duration => "Duration",
            ValueType::Date => "Date",
            ValueType::Time => "Time",
            ValueType::LocalTime => "LocalTime",
            ValueType::DateTime => "DateTime",
            ValueType::LocalDateTime => "LocalDateTime",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Value {
    pub fn type_of(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Bytes(_) => ValueType::Bytes,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Node(_) => ValueType::Node,
            Value::Relationship(_) => ValueType::Relationship,
            Value::Path(_) => ValueType::Path,
            Value::Point2D(_) => ValueType::Point2D,
            Value::Point3D(_) => ValueType::Point3D,
            Value::Duration(_) => ValueType::Duration,
            Value::Date(_) => ValueType::Date,
            Value::Time(_) => ValueType::Time,
            Value::LocalTime(_) => ValueType::LocalTime,
            Value::DateTime(_) => ValueType::DateTime,
            Value::LocalDateTime(_) => ValueType::LocalDateTime,
        }
    }

    pub fn type_str(&self) -> &'static str {
        self.type_of().as_str()
    }

    /// Whether every variant in this value's subtree is representable at
    /// `version`. v1 rejects anything v2-only no matter how deeply nested.
    pub fn is_supported(&self, version: BoltVersion) -> bool {
        if version == BoltVersion::V2 {
            return true;
        }
        match self {
            Value::Bytes(_)
            | Value::Point2D(_)
            | Value::Point3D(_)
            | Value::Duration(_)
            | Value::Date(_)
            | Value::Time(_)
            | Value::LocalTime(_)
            | Value::DateTime(_)
            | Value::LocalDateTime(_) => false,
            Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_) => true,
            Value::List(items) => items.iter().all(|v| v.is_supported(version)),
            Value::Map(map) => map.iter().all(|(_, v)| v.is_supported(version)),
            Value::Node(n) => n.properties.iter().all(|(_, v)| v.is_supported(version)),
            Value::Relationship(r) => r.properties.iter().all(|(_, v)| v.is_supported(version)),
            Value::Path(p) => {
                p.nodes
                    .iter()
                    .all(|n| n.properties.iter().all(|(_, v)| v.is_supported(version)))
                    && p.rels
                        .iter()
                        .all(|r| r.properties.iter().all(|(_, v)| v.is_supported(version)))
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => crate::temporal::f64_bit_eq(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y),
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Node(a), Value::Node(b)) => a == b,
            (Value::Relationship(a), Value::Relationship(b)) => a == b,
            (Value::Path(a), Value::Path(b)) => a == b,
            (Value::Point2D(a), Value::Point2D(b)) => a.bit_eq(b),
            (Value::Point3D(a), Value::Point3D(b)) => a.bit_eq(b),
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::LocalTime(a), Value::LocalTime(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::LocalDateTime(a), Value::LocalDateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Bytes(b) => write!(f, "#{}", hex_preview(b)),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k:?}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Node(n) => write!(f, "{n}"),
            Value::Relationship(r) => write!(f, "{r}"),
            Value::Path(p) => write!(f, "{p}"),
            Value::Point2D(p) => write!(f, "point({{srid:{}, x:{}, y:{}}})", p.srid, p.x, p.y),
            Value::Point3D(p) => write!(f, "point({{srid:{}, x:{}, y:{}, z:{}}})", p.srid, p.x, p.y, p.z),
            Value::Duration(d) => write!(
                f,
                "P{}M{}DT{}.{:09}S",
                d.months, d.days, d.seconds, d.nanos
            ),
            Value::Date(d) => write!(f, "Date({})", d.days),
            Value::Time(t) => write!(f, "Time({}+{})", t.nanos_since_midnight, t.tz_offset_seconds),
            Value::LocalTime(t) => write!(f, "LocalTime({})", t.nanos_since_midnight),
            Value::DateTime(dt) => write!(f, "DateTime({}.{:09})", dt.epoch_seconds, dt.nanos),
            Value::LocalDateTime(dt) => write!(f, "LocalDateTime({}.{:09})", dt.epoch_seconds, dt.nanos),
        }
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}
impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}
impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::from(items))
    }
}
impl From<PropMap> for Value {
    fn from(map: PropMap) -> Self {
        Value::Map(map)
    }
}

impl TryFrom<Value> for i64 {
    type Error = ValueError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(i) => Ok(i),
            _ => Err(ValueError::InvalidArgument),
        }
    }
}
impl TryFrom<Value> for f64 {
    type Error = ValueError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float(f) => Ok(f),
            _ => Err(ValueError::InvalidArgument),
        }
    }
}
impl TryFrom<Value> for String {
    type Error = ValueError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(s) => Ok(s.to_string()),
            _ => Err(ValueError::InvalidArgument),
        }
    }
}
impl TryFrom<Value> for bool {
    type Error = ValueError;
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(b),
            _ => Err(ValueError::InvalidArgument),
        }
    }
}

/// Build a [`PropMap`] from native Rust values without hand-assembling the
/// tagged tree — the DATA MODEL section of the spec left this out, but
/// every real driver needs it for `run()`'s `params` argument.
#[macro_export]
macro_rules! params {
    ( $( $key:expr => $value:expr ),* $(,)? ) => {{
        let entries: Vec<(std::sync::Arc<str>, $crate::Value)> = vec![
            $( (std::sync::Arc::from($key), $crate::Value::from($value)) ),*
        ];
        $crate::PropMap::new(entries)
    }};
}
