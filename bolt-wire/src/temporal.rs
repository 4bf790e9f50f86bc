//! Bolt v2 temporal and spatial value payloads.
//!
//! None of these exist in Bolt v1 — every type here is rejected by
//! [`crate::value::Value::is_supported`] when checked against
//! [`crate::BoltVersion::V1`].

use std::sync::Arc;

/// Calendar date: days since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub days: i64,
}

/// Time of day with a UTC offset, independent of any calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Time {
    pub nanos_since_midnight: i64,
    pub tz_offset_seconds: i32,
}

/// Time of day with no attached offset or zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    pub nanos_since_midnight: i64,
}

/// The two ways Bolt encodes a zoned `DateTime`: a fixed UTC offset, or a
/// named IANA zone whose offset is computed by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zone {
    Offset { seconds: i32 },
    Id { name: Arc<str> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTime {
    pub epoch_seconds: i64,
    pub nanos: i32,
    pub zone: Zone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDateTime {
    pub epoch_seconds: i64,
    pub nanos: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub srid: i32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3D {
    pub srid: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

// Value equality uses bit-exact float comparison (spec §4.2: "float uses
// bit-equal comparison, NaN != NaN is accepted"). `Point2D`/`Point3D` can't
// derive `Eq` because of the `f64` fields, so the bit-exact rule is
// implemented once here and reused by `Value::eq`.
pub(crate) fn f64_bit_eq(a: f64, b: f64) -> bool {
    a.to_bits() == b.to_bits()
}

impl Point2D {
    pub(crate) fn bit_eq(&self, other: &Point2D) -> bool {
        self.srid == other.srid && f64_bit_eq(self.x, other.x) && f64_bit_eq(self.y, other.y)
    }
}

impl Point3D {
    pub(crate) fn bit_eq(&self, other: &Point3D) -> bool {
        self.srid == other.srid
            && f64_bit_eq(self.x, other.x)
            && f64_bit_eq(self.y, other.y)
            && f64_bit_eq(self.z, other.z)
    }
}
