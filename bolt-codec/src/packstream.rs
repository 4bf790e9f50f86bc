//! PackStream: the binary encoding Bolt messages and values are expressed
//! in (§6). Every marker byte either *is* its own payload (tiny-int,
//! tiny-string/list/map/struct headers) or introduces a fixed-width length
//! field followed by that many bytes — there's no escaping or separators,
//! so decode is a straightforward marker match with no backtracking.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::sync::Arc;

use bolt_wire::{
    graph::{Node, Path, RelEndpoints, Relationship, UnboundRelationship},
    temporal::{Date, DateTime, Duration, LocalDateTime, LocalTime, Point2D, Point3D, Time, Zone},
    value::{PropMap, Value},
    BoltVersion, ErrorCode, Signature,
};

use crate::error::CodecError;

mod marker {
    pub const NULL: u8 = 0xC0;
    pub const FLOAT_64: u8 = 0xC1;
    pub const FALSE: u8 = 0xC2;
    pub const TRUE: u8 = 0xC3;
    pub const INT_8: u8 = 0xC8;
    pub const INT_16: u8 = 0xC9;
    pub const INT_32: u8 = 0xCA;
    pub const INT_64: u8 = 0xCB;
    pub const BYTES_8: u8 = 0xCC;
    pub const BYTES_16: u8 = 0xCD;
    pub const BYTES_32: u8 = 0xCE;
    pub const STRING_8: u8 = 0xD0;
    pub const STRING_16: u8 = 0xD1;
    pub const STRING_32: u8 = 0xD2;
    pub const LIST_8: u8 = 0xD4;
    pub const LIST_16: u8 = 0xD5;
    pub const LIST_32: u8 = 0xD6;
    pub const MAP_8: u8 = 0xD8;
    pub const MAP_16: u8 = 0xD9;
    pub const MAP_32: u8 = 0xDA;
    pub const STRUCT_8: u8 = 0xDC;
    pub const STRUCT_16: u8 = 0xDD;

    pub const TINY_STRING_BASE: u8 = 0x80;
    pub const TINY_LIST_BASE: u8 = 0x90;
    pub const TINY_MAP_BASE: u8 = 0xA0;
    pub const TINY_STRUCT_BASE: u8 = 0xB0;
}

/// Encode `value` onto `out` using markers valid at `version`. Fails if the
/// value (or anything nested inside it) isn't representable at that
/// version — see [`Value::is_supported`].
pub fn encode(value: &Value, version: BoltVersion, out: &mut BytesMut) -> Result<(), CodecError> {
    if !value.is_supported(version) {
        return Err(CodecError::new(
            ErrorCode::ProtocolViolation,
            format!("{} is not representable in Bolt v{version}", value.type_str()),
        ));
    }
    encode_unchecked(value, out);
    Ok(())
}

fn encode_unchecked(value: &Value, out: &mut BytesMut) {
    match value {
        Value::Null => out.put_u8(marker::NULL),
        Value::Bool(false) => out.put_u8(marker::FALSE),
        Value::Bool(true) => out.put_u8(marker::TRUE),
        Value::Int(i) => encode_int(*i, out),
        Value::Float(f) => {
            out.put_u8(marker::FLOAT_64);
            out.put_f64(*f);
        }
        Value::String(s) => encode_string(s, out),
        Value::Bytes(b) => encode_bytes(b, out),
        Value::List(items) => {
            encode_container_header(marker::TINY_LIST_BASE, marker::LIST_8, marker::LIST_16, marker::LIST_32, items.len(), out);
            for item in items.iter() {
                encode_unchecked(item, out);
            }
        }
        Value::Map(map) => {
            encode_container_header(marker::TINY_MAP_BASE, marker::MAP_8, marker::MAP_16, marker::MAP_32, map.raw_len(), out);
            for (k, v) in map.iter() {
                encode_string(k, out);
                encode_unchecked(v, out);
            }
        }
        Value::Node(n) => encode_node(n, out),
        Value::Relationship(r) => encode_relationship(r, out),
        Value::Path(p) => encode_path(p, out),
        Value::Point2D(p) => {
            encode_struct_header(Signature::Point2D, 3, out);
            encode_unchecked(&Value::Int(p.srid as i64), out);
            encode_unchecked(&Value::Float(p.x), out);
            encode_unchecked(&Value::Float(p.y), out);
        }
        Value::Point3D(p) => {
            encode_struct_header(Signature::Point3D, 4, out);
            encode_unchecked(&Value::Int(p.srid as i64), out);
            encode_unchecked(&Value::Float(p.x), out);
            encode_unchecked(&Value::Float(p.y), out);
            encode_unchecked(&Value::Float(p.z), out);
        }
        Value::Duration(d) => {
            encode_struct_header(Signature::Duration, 4, out);
            encode_unchecked(&Value::Int(d.months), out);
            encode_unchecked(&Value::Int(d.days), out);
            encode_unchecked(&Value::Int(d.seconds), out);
            encode_unchecked(&Value::Int(d.nanos as i64), out);
        }
        Value::Date(d) => {
            encode_struct_header(Signature::Date, 1, out);
            encode_unchecked(&Value::Int(d.days), out);
        }
        Value::Time(t) => {
            encode_struct_header(Signature::Time, 2, out);
            encode_unchecked(&Value::Int(t.nanos_since_midnight), out);
            encode_unchecked(&Value::Int(t.tz_offset_seconds as i64), out);
        }
        Value::LocalTime(t) => {
            encode_struct_header(Signature::LocalTime, 1, out);
            encode_unchecked(&Value::Int(t.nanos_since_midnight), out);
        }
        Value::DateTime(dt) => match &dt.zone {
            Zone::Offset { seconds } => {
                encode_struct_header(Signature::DateTimeOffset, 3, out);
                encode_unchecked(&Value::Int(dt.epoch_seconds), out);
                encode_unchecked(&Value::Int(dt.nanos as i64), out);
                encode_unchecked(&Value::Int(*seconds as i64), out);
            }
            Zone::Id { name } => {
                encode_struct_header(Signature::DateTimeZoneId, 3, out);
                encode_unchecked(&Value::Int(dt.epoch_seconds), out);
                encode_unchecked(&Value::Int(dt.nanos as i64), out);
                encode_unchecked(&Value::String(name.clone()), out);
            }
        },
        Value::LocalDateTime(dt) => {
            encode_struct_header(Signature::LocalDateTime, 2, out);
            encode_unchecked(&Value::Int(dt.epoch_seconds), out);
            encode_unchecked(&Value::Int(dt.nanos as i64), out);
        }
    }
}

fn encode_int(i: i64, out: &mut BytesMut) {
    if (-16..=127).contains(&i) {
        out.put_i8(i as i8);
    } else if (i8::MIN as i64..=i8::MAX as i64).contains(&i) {
        out.put_u8(marker::INT_8);
        out.put_i8(i as i8);
    } else if (i16::MIN as i64..=i16::MAX as i64).contains(&i) {
        out.put_u8(marker::INT_16);
        out.put_i16(i as i16);
    } else if (i32::MIN as i64..=i32::MAX as i64).contains(&i) {
        out.put_u8(marker::INT_32);
        out.put_i32(i as i32);
    } else {
        out.put_u8(marker::INT_64);
        out.put_i64(i);
    }
}

fn encode_string(s: &str, out: &mut BytesMut) {
    let bytes = s.as_bytes();
    encode_container_header(marker::TINY_STRING_BASE, marker::STRING_8, marker::STRING_16, marker::STRING_32, bytes.len(), out);
    out.put_slice(bytes);
}

fn encode_bytes(b: &[u8], out: &mut BytesMut) {
    match b.len() {
        n if n <= u8::MAX as usize => {
            out.put_u8(marker::BYTES_8);
            out.put_u8(n as u8);
        }
        n if n <= u16::MAX as usize => {
            out.put_u8(marker::BYTES_16);
            out.put_u16(n as u16);
        }
        n => {
            out.put_u8(marker::BYTES_32);
            out.put_u32(n as u32);
        }
    }
    out.put_slice(b);
}

fn encode_container_header(tiny_base: u8, m8: u8, m16: u8, m32: u8, len: usize, out: &mut BytesMut) {
    match len {
        n if n <= 15 => out.put_u8(tiny_base | n as u8),
        n if n <= u8::MAX as usize => {
            out.put_u8(m8);
            out.put_u8(n as u8);
        }
        n if n <= u16::MAX as usize => {
            out.put_u8(m16);
            out.put_u16(n as u16);
        }
        n => {
            out.put_u8(m32);
            out.put_u32(n as u32);
        }
    }
}

fn encode_struct_header(sig: Signature, argc: usize, out: &mut BytesMut) {
    if argc <= 15 {
        out.put_u8(marker::TINY_STRUCT_BASE | argc as u8);
    } else if argc <= u8::MAX as usize {
        out.put_u8(marker::STRUCT_8);
        out.put_u8(argc as u8);
    } else {
        out.put_u8(marker::STRUCT_16);
        out.put_u16(argc as u16);
    }
    out.put_u8(sig.as_byte());
}

fn encode_node(n: &Node, out: &mut BytesMut) {
    encode_struct_header(Signature::Node, 3, out);
    encode_unchecked(&Value::Int(n.id), out);
    let labels: Vec<Value> = n.labels.iter().map(|l| Value::String(l.clone())).collect();
    encode_unchecked(&Value::from(labels), out);
    encode_unchecked(&Value::Map(n.properties.clone()), out);
}

fn encode_relationship(r: &Relationship, out: &mut BytesMut) {
    match r.endpoints {
        RelEndpoints::Bound { start, end } => {
            encode_struct_header(Signature::Relationship, 5, out);
            encode_unchecked(&Value::Int(r.id), out);
            encode_unchecked(&Value::Int(start), out);
            encode_unchecked(&Value::Int(end), out);
            encode_unchecked(&Value::String(r.rel_type.clone()), out);
            encode_unchecked(&Value::Map(r.properties.clone()), out);
        }
        RelEndpoints::Unbound => {
            encode_struct_header(Signature::UnboundRelationship, 3, out);
            encode_unchecked(&Value::Int(r.id), out);
            encode_unchecked(&Value::String(r.rel_type.clone()), out);
            encode_unchecked(&Value::Map(r.properties.clone()), out);
        }
    }
}

fn encode_unbound_relationship(r: &UnboundRelationship, out: &mut BytesMut) {
    encode_struct_header(Signature::UnboundRelationship, 3, out);
    encode_unchecked(&Value::Int(r.id), out);
    encode_unchecked(&Value::String(r.rel_type.clone()), out);
    encode_unchecked(&Value::Map(r.properties.clone()), out);
}

fn encode_path(p: &Path, out: &mut BytesMut) {
    encode_struct_header(Signature::Path, 3, out);
    let nodes: Vec<Value> = p.nodes.iter().map(|n| Value::Node(n.clone())).collect();
    encode_unchecked(&Value::from(nodes), out);
    encode_container_header(marker::TINY_LIST_BASE, marker::LIST_8, marker::LIST_16, marker::LIST_32, p.rels.len(), out);
    for rel in p.rels.iter() {
        encode_unbound_relationship(rel, out);
    }
    let sequence: Vec<Value> = p.sequence.iter().map(|i| Value::Int(*i)).collect();
    encode_unchecked(&Value::from(sequence), out);
}

/// Encode a whole protocol message (§6's `INIT`/`RUN`/`SUCCESS`/... struct
/// envelope) rather than a nested struct *value* — the distinction matters
/// because message signatures (`Signature::Run`, `Signature::Success`, ...)
/// are never legal inside a [`Value`] tree the way `Signature::Node` is.
pub fn encode_message_body(signature: Signature, argv: &[Value], version: BoltVersion, out: &mut BytesMut) -> Result<(), CodecError> {
    for v in argv {
        if !v.is_supported(version) {
            return Err(CodecError::new(
                ErrorCode::ProtocolViolation,
                format!("{} is not representable in Bolt v{version}", v.type_str()),
            ));
        }
    }
    encode_struct_header(signature, argv.len(), out);
    for v in argv {
        encode_unchecked(v, out);
    }
    Ok(())
}

/// Decode a whole protocol message envelope: the struct header, its
/// signature, and its argument list. The counterpart to
/// [`encode_message_body`].
pub fn decode_message_body(input: &mut Bytes, version: BoltVersion) -> Result<(Signature, Vec<Value>), CodecError> {
    let marker = read_u8(input)?;
    let argc = if (marker::TINY_STRUCT_BASE..marker::TINY_STRUCT_BASE + 16).contains(&marker) {
        (marker - marker::TINY_STRUCT_BASE) as usize
    } else if marker == marker::STRUCT_8 {
        read_u8(input)? as usize
    } else if marker == marker::STRUCT_16 {
        read_u16(input)? as usize
    } else {
        return Err(CodecError::new(ErrorCode::ProtocolViolation, format!("expected a message envelope, got marker {marker:#04x}")));
    };

    let sig_byte = read_u8(input)?;
    let sig = Signature::from_byte(sig_byte)
        .ok_or_else(|| CodecError::new(ErrorCode::UnknownSignature, format!("unknown message signature {sig_byte:#04x}")))?;
    if let Some(expected) = sig.expected_argc() {
        if expected != argc {
            return Err(CodecError::new(
                ErrorCode::WrongArgc,
                format!("{sig} expects {expected} fields, got {argc}"),
            ));
        }
    }
    let mut argv = Vec::with_capacity(argc);
    for _ in 0..argc {
        argv.push(decode(input, version)?);
    }
    Ok((sig, argv))
}

/// Decode one complete [`Value`] from the front of `input`, advancing it
/// past the bytes consumed. `version` governs which struct signatures are
/// accepted.
pub fn decode(input: &mut Bytes, version: BoltVersion) -> Result<Value, CodecError> {
    let marker = read_u8(input)?;
    decode_with_marker(marker, input, version)
}

fn decode_with_marker(marker: u8, input: &mut Bytes, version: BoltVersion) -> Result<Value, CodecError> {
    match marker {
        marker::NULL => Ok(Value::Null),
        marker::FALSE => Ok(Value::Bool(false)),
        marker::TRUE => Ok(Value::Bool(true)),
        marker::FLOAT_64 => Ok(Value::Float(read_f64(input)?)),
        marker::INT_8 => Ok(Value::Int(read_i8(input)? as i64)),
        marker::INT_16 => Ok(Value::Int(read_i16(input)? as i64)),
        marker::INT_32 => Ok(Value::Int(read_i32(input)? as i64)),
        marker::INT_64 => Ok(Value::Int(read_i64(input)?)),
        marker::BYTES_8 | marker::BYTES_16 | marker::BYTES_32 => {
            if version == BoltVersion::V1 {
                return Err(CodecError::new(ErrorCode::ProtocolViolation, "Bytes is not valid in Bolt v1"));
            }
            let len = read_container_len(marker, marker::BYTES_8, marker::BYTES_16, marker::BYTES_32, input)?;
            Ok(Value::Bytes(Arc::from(read_slice(input, len)?)))
        }
        marker::STRING_8 | marker::STRING_16 | marker::STRING_32 => {
            let len = read_container_len(marker, marker::STRING_8, marker::STRING_16, marker::STRING_32, input)?;
            Ok(Value::String(Arc::from(read_utf8(input, len)?)))
        }
        m if (marker::TINY_STRING_BASE..marker::TINY_STRING_BASE + 16).contains(&m) => {
            let len = (m - marker::TINY_STRING_BASE) as usize;
            Ok(Value::String(Arc::from(read_utf8(input, len)?)))
        }
        marker::LIST_8 | marker::LIST_16 | marker::LIST_32 => {
            let len = read_container_len(marker, marker::LIST_8, marker::LIST_16, marker::LIST_32, input)?;
            decode_list(input, len, version)
        }
        m if (marker::TINY_LIST_BASE..marker::TINY_LIST_BASE + 16).contains(&m) => {
            decode_list(input, (m - marker::TINY_LIST_BASE) as usize, version)
        }
        marker::MAP_8 | marker::MAP_16 | marker::MAP_32 => {
            let len = read_container_len(marker, marker::MAP_8, marker::MAP_16, marker::MAP_32, input)?;
            decode_map(input, len, version)
        }
        m if (marker::TINY_MAP_BASE..marker::TINY_MAP_BASE + 16).contains(&m) => {
            decode_map(input, (m - marker::TINY_MAP_BASE) as usize, version)
        }
        marker::STRUCT_8 | marker::STRUCT_16 => {
            let argc = read_container_len(marker, marker::STRUCT_8, marker::STRUCT_16, marker::STRUCT_16, input)?;
            decode_struct(input, argc, version)
        }
        m if (marker::TINY_STRUCT_BASE..marker::TINY_STRUCT_BASE + 16).contains(&m) => {
            decode_struct(input, (m - marker::TINY_STRUCT_BASE) as usize, version)
        }
        m if m >= 0xF0 || m <= 0x7F => Ok(Value::Int(m as i8 as i64)),
        other => Err(CodecError::new(ErrorCode::ProtocolViolation, format!("unknown marker byte {other:#04x}"))),
    }
}

fn decode_list(input: &mut Bytes, len: usize, version: BoltVersion) -> Result<Value, CodecError> {
    let mut items = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        items.push(decode(input, version)?);
    }
    Ok(Value::from(items))
}

fn decode_map(input: &mut Bytes, len: usize, version: BoltVersion) -> Result<Value, CodecError> {
    let mut entries = Vec::with_capacity(len.min(4096));
    for _ in 0..len {
        let key = match decode(input, version)? {
            Value::String(s) => s,
            other => {
                return Err(CodecError::new(
                    ErrorCode::ProtocolViolation,
                    format!("map key must be String, got {}", other.type_str()),
                ))
            }
        };
        let value = decode(input, version)?;
        entries.push((key, value));
    }
    Ok(Value::Map(PropMap::new(entries)))
}

fn decode_struct(input: &mut Bytes, argc: usize, version: BoltVersion) -> Result<Value, CodecError> {
    let sig_byte = read_u8(input)?;
    let sig = Signature::from_byte(sig_byte)
        .ok_or_else(|| CodecError::new(ErrorCode::UnknownSignature, format!("unknown struct signature {sig_byte:#04x}")))?;
    if let Some(expected) = sig.expected_argc() {
        if expected != argc {
            return Err(CodecError::new(
                ErrorCode::WrongArgc,
                format!("{sig} expects {expected} fields, got {argc}"),
            ));
        }
    }

    let mut argv = Vec::with_capacity(argc);
    for _ in 0..argc {
        argv.push(decode(input, version)?);
    }

    match sig {
        Signature::Node => build_node(argv),
        Signature::Relationship => build_relationship(argv),
        Signature::UnboundRelationship => build_unbound_relationship(argv).map(|r| {
            // Standalone decode of an UNBOUND_RELATIONSHIP (outside a Path)
            // surfaces as a bound-less Relationship value.
            Value::Relationship(Relationship {
                id: r.id,
                endpoints: RelEndpoints::Unbound,
                rel_type: r.rel_type,
                properties: r.properties,
            })
        }),
        Signature::Path => build_path(argv, version),
        Signature::Date => build_date(argv),
        Signature::Time => build_time(argv),
        Signature::LocalTime => build_local_time(argv),
        Signature::DateTimeOffset => build_datetime_offset(argv),
        Signature::DateTimeZoneId => build_datetime_zone_id(argv),
        Signature::LocalDateTime => build_local_datetime(argv),
        Signature::Duration => build_duration(argv),
        Signature::Point2D => build_point2d(argv),
        Signature::Point3D => build_point3d(argv),
        other => Err(CodecError::new(
            ErrorCode::ProtocolViolation,
            format!("{other} is a message signature, not a value struct"),
        )),
    }
}

fn as_int(v: Value) -> Result<i64, CodecError> {
    match v {
        Value::Int(i) => Ok(i),
        other => Err(CodecError::new(ErrorCode::ProtocolViolation, format!("expected Integer, got {}", other.type_str()))),
    }
}

fn as_string(v: Value) -> Result<Arc<str>, CodecError> {
    match v {
        Value::String(s) => Ok(s),
        other => Err(CodecError::new(ErrorCode::ProtocolViolation, format!("expected String, got {}", other.type_str()))),
    }
}

fn as_float(v: Value) -> Result<f64, CodecError> {
    match v {
        Value::Float(f) => Ok(f),
        other => Err(CodecError::new(ErrorCode::ProtocolViolation, format!("expected Float, got {}", other.type_str()))),
    }
}

fn as_map(v: Value) -> Result<PropMap, CodecError> {
    match v {
        Value::Map(m) => Ok(m),
        other => Err(CodecError::new(ErrorCode::ProtocolViolation, format!("expected Map, got {}", other.type_str()))),
    }
}

fn as_list(v: Value) -> Result<Arc<[Value]>, CodecError> {
    match v {
        Value::List(items) => Ok(items),
        other => Err(CodecError::new(ErrorCode::ProtocolViolation, format!("expected List, got {}", other.type_str()))),
    }
}

fn build_node(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    let properties = as_map(argv.remove(2))?;
    let raw_labels = as_list(argv.remove(1))?;
    let mut labels = Vec::with_capacity(raw_labels.len());
    for label in raw_labels.iter() {
        match label {
            Value::String(s) => labels.push(s.clone()),
            other => {
                return Err(CodecError::new(
                    ErrorCode::ProtocolViolation,
                    format!("node label must be String, got {}", other.type_str()),
                ))
            }
        }
    }
    let id = as_int(argv.remove(0))?;
    Node::new(id, Arc::from(labels), properties)
        .map(Value::Node)
        .map_err(|e| CodecError::new(ErrorCode::ProtocolViolation, e.to_string()))
}

fn build_relationship(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    let properties = as_map(argv.remove(4))?;
    let rel_type = as_string(argv.remove(3))?;
    let end = as_int(argv.remove(2))?;
    let start = as_int(argv.remove(1))?;
    let id = as_int(argv.remove(0))?;
    Relationship::bound(id, start, end, rel_type, properties)
        .map(Value::Relationship)
        .map_err(|e| CodecError::new(ErrorCode::ProtocolViolation, e.to_string()))
}

fn build_unbound_relationship(mut argv: Vec<Value>) -> Result<UnboundRelationship, CodecError> {
    let properties = as_map(argv.remove(2))?;
    let rel_type = as_string(argv.remove(1))?;
    let id = as_int(argv.remove(0))?;
    UnboundRelationship::new(id, rel_type, properties).map_err(|e| CodecError::new(ErrorCode::ProtocolViolation, e.to_string()))
}

fn build_path(mut argv: Vec<Value>, version: BoltVersion) -> Result<Value, CodecError> {
    let sequence_raw = as_list(argv.remove(2))?;
    let rels_raw = as_list(argv.remove(1))?;
    let nodes_raw = as_list(argv.remove(0))?;
    let _ = version;

    let mut nodes = Vec::with_capacity(nodes_raw.len());
    for n in nodes_raw.iter() {
        match n {
            Value::Node(node) => nodes.push(node.clone()),
            other => {
                return Err(CodecError::new(
                    ErrorCode::ProtocolViolation,
                    format!("path node entry must be Node, got {}", other.type_str()),
                ))
            }
        }
    }

    let mut rels = Vec::with_capacity(rels_raw.len());
    for r in rels_raw.iter() {
        match r {
            Value::Relationship(rel) if matches!(rel.endpoints, RelEndpoints::Unbound) => {
                rels.push(UnboundRelationship {
                    id: rel.id,
                    rel_type: rel.rel_type.clone(),
                    properties: rel.properties.clone(),
                });
            }
            other => {
                return Err(CodecError::new(
                    ErrorCode::ProtocolViolation,
                    format!("path relationship entry must be UnboundRelationship, got {}", other.type_str()),
                ))
            }
        }
    }

    let mut sequence = Vec::with_capacity(sequence_raw.len());
    for idx in sequence_raw.iter() {
        sequence.push(as_int(idx.clone())?);
    }

    Path::new(nodes, rels, sequence)
        .map(Value::Path)
        .map_err(|e| CodecError::new(ErrorCode::ProtocolViolation, e.to_string()))
}

fn build_date(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    Ok(Value::Date(Date { days: as_int(argv.remove(0))? }))
}

fn build_time(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    let tz_offset_seconds = as_int(argv.remove(1))? as i32;
    let nanos_since_midnight = as_int(argv.remove(0))?;
    Ok(Value::Time(Time { nanos_since_midnight, tz_offset_seconds }))
}

fn build_local_time(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    Ok(Value::LocalTime(LocalTime { nanos_since_midnight: as_int(argv.remove(0))? }))
}

fn build_datetime_offset(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    let offset = as_int(argv.remove(2))? as i32;
    let nanos = as_int(argv.remove(1))? as i32;
    let epoch_seconds = as_int(argv.remove(0))?;
    Ok(Value::DateTime(DateTime { epoch_seconds, nanos, zone: Zone::Offset { seconds: offset } }))
}

fn build_datetime_zone_id(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    let name = as_string(argv.remove(2))?;
    let nanos = as_int(argv.remove(1))? as i32;
    let epoch_seconds = as_int(argv.remove(0))?;
    Ok(Value::DateTime(DateTime { epoch_seconds, nanos, zone: Zone::Id { name } }))
}

fn build_local_datetime(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    let nanos = as_int(argv.remove(1))? as i32;
    let epoch_seconds = as_int(argv.remove(0))?;
    Ok(Value::LocalDateTime(LocalDateTime { epoch_seconds, nanos }))
}

fn build_duration(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    let nanos = as_int(argv.remove(3))? as i32;
    let seconds = as_int(argv.remove(2))?;
    let days = as_int(argv.remove(1))?;
    let months = as_int(argv.remove(0))?;
    Ok(Value::Duration(Duration { months, days, seconds, nanos }))
}

fn build_point2d(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    let y = as_float(argv.remove(2))?;
    let x = as_float(argv.remove(1))?;
    let srid = as_int(argv.remove(0))? as i32;
    Ok(Value::Point2D(Point2D { srid, x, y }))
}

fn build_point3d(mut argv: Vec<Value>) -> Result<Value, CodecError> {
    let z = as_float(argv.remove(3))?;
    let y = as_float(argv.remove(2))?;
    let x = as_float(argv.remove(1))?;
    let srid = as_int(argv.remove(0))? as i32;
    Ok(Value::Point3D(Point3D { srid, x, y, z }))
}

fn read_container_len(marker: u8, m8: u8, m16: u8, m32: u8, input: &mut Bytes) -> Result<usize, CodecError> {
    if marker == m8 {
        Ok(read_u8(input)? as usize)
    } else if marker == m16 {
        Ok(read_u16(input)? as usize)
    } else if marker == m32 {
        Ok(read_u32(input)? as usize)
    } else {
        unreachable!("read_container_len called with mismatched marker")
    }
}

fn need(input: &Bytes, n: usize) -> Result<(), CodecError> {
    if input.remaining() < n {
        Err(CodecError::new(ErrorCode::ProtocolViolation, "unexpected end of input"))
    } else {
        Ok(())
    }
}

fn read_u8(input: &mut Bytes) -> Result<u8, CodecError> {
    need(input, 1)?;
    Ok(input.get_u8())
}
fn read_i8(input: &mut Bytes) -> Result<i8, CodecError> {
    need(input, 1)?;
    Ok(input.get_i8())
}
fn read_u16(input: &mut Bytes) -> Result<u16, CodecError> {
    need(input, 2)?;
    Ok(input.get_u16())
}
fn read_i16(input: &mut Bytes) -> Result<i16, CodecError> {
    need(input, 2)?;
    Ok(input.get_i16())
}
fn read_u32(input: &mut Bytes) -> Result<u32, CodecError> {
    need(input, 4)?;
    Ok(input.get_u32())
}
fn read_i32(input: &mut Bytes) -> Result<i32, CodecError> {
    need(input, 4)?;
    Ok(input.get_i32())
}
fn read_i64(input: &mut Bytes) -> Result<i64, CodecError> {
    need(input, 8)?;
    Ok(input.get_i64())
}
fn read_f64(input: &mut Bytes) -> Result<f64, CodecError> {
    need(input, 8)?;
    Ok(input.get_f64())
}
fn read_slice(input: &mut Bytes, len: usize) -> Result<Vec<u8>, CodecError> {
    need(input, len)?;
    Ok(input.split_to(len).to_vec())
}
fn read_utf8(input: &mut Bytes, len: usize) -> Result<String, CodecError> {
    let bytes = read_slice(input, len)?;
    String::from_utf8(bytes).map_err(|_| CodecError::new(ErrorCode::ProtocolViolation, "string is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bolt_wire::value::PropMap;

    fn roundtrip(value: Value, version: BoltVersion) -> Value {
        let mut buf = BytesMut::new();
        encode(&value, version, &mut buf).unwrap();
        let mut bytes = buf.freeze();
        let decoded = decode(&mut bytes, version).unwrap();
        assert!(bytes.is_empty(), "decode left {} trailing bytes", bytes.len());
        decoded
    }

    #[test]
    fn null_bool_roundtrip() {
        assert_eq!(roundtrip(Value::Null, BoltVersion::V1), Value::Null);
        assert_eq!(roundtrip(Value::Bool(true), BoltVersion::V1), Value::Bool(true));
        assert_eq!(roundtrip(Value::Bool(false), BoltVersion::V1), Value::Bool(false));
    }

    #[test]
    fn integers_roundtrip_across_all_widths() {
        for i in [0i64, -16, 127, -17, 128, i16::MIN as i64, i16::MAX as i64 + 1, i32::MIN as i64, i64::MAX] {
            assert_eq!(roundtrip(Value::Int(i), BoltVersion::V1), Value::Int(i));
        }
    }

    #[test]
    fn float_roundtrips_bit_exact() {
        assert_eq!(roundtrip(Value::Float(3.5), BoltVersion::V1), Value::Float(3.5));
    }

    #[test]
    fn string_roundtrips_tiny_and_sized() {
        let short = Value::from("hi");
        assert_eq!(roundtrip(short.clone(), BoltVersion::V1), short);
        let long = Value::from("x".repeat(300));
        assert_eq!(roundtrip(long.clone(), BoltVersion::V1), long);
    }

    #[test]
    fn bytes_rejected_in_v1() {
        let value = Value::Bytes(Arc::from(vec![1u8, 2, 3]));
        let mut buf = BytesMut::new();
        assert!(encode(&value, BoltVersion::V1, &mut buf).is_err());
    }

    #[test]
    fn bytes_roundtrip_in_v2() {
        let value = Value::Bytes(Arc::from(vec![1u8, 2, 3]));
        assert_eq!(roundtrip(value.clone(), BoltVersion::V2), value);
    }

    #[test]
    fn list_and_map_roundtrip() {
        let list = Value::from(vec![Value::Int(1), Value::from("a"), Value::Null]);
        assert_eq!(roundtrip(list.clone(), BoltVersion::V1), list);

        let map = Value::Map(PropMap::new(vec![(Arc::from("k"), Value::Int(1))]));
        assert_eq!(roundtrip(map.clone(), BoltVersion::V1), map);
    }

    #[test]
    fn node_roundtrips() {
        let node = Node::new(1, Arc::from(vec![Arc::from("Person")]), PropMap::new(vec![(Arc::from("name"), Value::from("Alice"))])).unwrap();
        let value = Value::Node(node);
        assert_eq!(roundtrip(value.clone(), BoltVersion::V1), value);
    }

    #[test]
    fn map_with_non_string_key_is_rejected() {
        let mut buf = BytesMut::new();
        // Hand-build a tiny map with one entry whose key is an Int, not a String.
        buf.extend_from_slice(&[0xA1]); // tiny map, 1 entry
        encode_unchecked(&Value::Int(1), &mut buf); // key
        encode_unchecked(&Value::Int(2), &mut buf); // value
        let mut bytes = buf.freeze();
        assert!(decode(&mut bytes, BoltVersion::V1).is_err());
    }

    #[test]
    fn message_body_roundtrips() {
        let argv = vec![Value::from("RETURN 1"), Value::Map(PropMap::empty())];
        let mut buf = BytesMut::new();
        encode_message_body(Signature::Run, &argv, BoltVersion::V1, &mut buf).unwrap();
        let mut bytes = buf.freeze();
        let (sig, decoded) = decode_message_body(&mut bytes, BoltVersion::V1).unwrap();
        assert_eq!(sig, Signature::Run);
        assert_eq!(decoded, argv);
        assert!(bytes.is_empty());
    }

    #[test]
    fn unknown_signature_is_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0xB0, 0x99]); // 0-arg struct, unknown signature
        let mut bytes = buf.freeze();
        let err = decode(&mut bytes, BoltVersion::V1).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownSignature);
    }
}
