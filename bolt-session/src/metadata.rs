//! Extracting typed metadata out of the free-form `Map` argument a
//! `SUCCESS`/`FAILURE` message carries (C7).
//!
//! The wire format leaves every one of these fields optional and untyped —
//! a `Map<String, Value>` is all §6 promises. This module is the one place
//! that assumes specific keys and shapes so the rest of the session engine
//! can work with plain structs instead of re-deriving this every time it
//! needs a field name or a statistic.

use std::sync::Arc;

use bolt_wire::value::{PropMap, Value};
use bolt_wire::{BoltError, FailureDetails};

use crate::session::protocol_violation;

/// Metadata carried by a `RUN`-response `SUCCESS` (the field names for the
/// rows about to stream) merged with whatever a terminal `SUCCESS` adds
/// (stats, plan, profile, bookmark, ...). Both shapes go through the same
/// struct since a single-statement session only ever needs to hold one at
/// a time between RUN and the terminal pull response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuccessMetadata {
    pub fields: Vec<Arc<str>>,
    pub statement_type: Option<StatementType>,
    pub stats: Option<StatementStats>,
    pub plan: Option<StatementPlan>,
    pub profile: Option<StatementPlan>,
    pub bookmark: Option<Arc<str>>,
    pub result_available_after_ms: Option<i64>,
    pub result_consumed_after_ms: Option<i64>,
    /// Any key this extractor doesn't special-case, kept around verbatim
    /// so callers aren't locked out of server extensions.
    pub extra: PropMap,
}

/// The `type` field of a terminal `SUCCESS` (§4.7): what kind of statement
/// just ran, derived from the server's single-character code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    SchemaUpdate,
}

impl StatementType {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "r" => Some(StatementType::ReadOnly),
            "w" => Some(StatementType::WriteOnly),
            "rw" => Some(StatementType::ReadWrite),
            "s" => Some(StatementType::SchemaUpdate),
            _ => None,
        }
    }
}

/// Counters a server reports for a write statement (`stats` key).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementStats {
    pub nodes_created: i64,
    pub nodes_deleted: i64,
    pub relationships_created: i64,
    pub relationships_deleted: i64,
    pub properties_set: i64,
    pub labels_added: i64,
    pub labels_removed: i64,
    pub indexes_added: i64,
    pub indexes_removed: i64,
    pub constraints_added: i64,
    pub constraints_removed: i64,
}

/// An `EXPLAIN`/`PROFILE` plan tree (`plan`/`profile` keys). The tree shape
/// mirrors the server's own: an operator name, its arguments, the
/// identifiers it binds, and nested child operators.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementPlan {
    pub operator_type: Arc<str>,
    pub identifiers: Vec<Arc<str>>,
    pub arguments: PropMap,
    pub children: Vec<StatementPlan>,
    pub estimated_rows: Option<i64>,
    /// Present only on a `profile` tree, never on a plain `plan`.
    pub db_hits: Option<i64>,
    pub rows: Option<i64>,
    pub page_cache_hits: Option<i64>,
    pub page_cache_misses: Option<i64>,
}

fn get_str(map: &PropMap, key: &str) -> Option<Arc<str>> {
    match map.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn get_int(map: &PropMap, key: &str) -> Option<i64> {
    match map.get(key) {
        Some(Value::Int(i)) => Some(*i),
        _ => None,
    }
}

fn get_list<'a>(map: &'a PropMap, key: &str) -> Option<&'a [Value]> {
    match map.get(key) {
        Some(Value::List(items)) => Some(items),
        _ => None,
    }
}

fn get_map(map: &PropMap, key: &str) -> Option<PropMap> {
    match map.get(key) {
        Some(Value::Map(m)) => Some(m.clone()),
        _ => None,
    }
}

impl StatementStats {
    fn from_map(map: &PropMap) -> Self {
        StatementStats {
            nodes_created: get_int(map, "nodes-created").unwrap_or(0),
            nodes_deleted: get_int(map, "nodes-deleted").unwrap_or(0),
            relationships_created: get_int(map, "relationships-created").unwrap_or(0),
            relationships_deleted: get_int(map, "relationships-deleted").unwrap_or(0),
            properties_set: get_int(map, "properties-set").unwrap_or(0),
            labels_added: get_int(map, "labels-added").unwrap_or(0),
            labels_removed: get_int(map, "labels-removed").unwrap_or(0),
            indexes_added: get_int(map, "indexes-added").unwrap_or(0),
            indexes_removed: get_int(map, "indexes-removed").unwrap_or(0),
            constraints_added: get_int(map, "constraints-added").unwrap_or(0),
            constraints_removed: get_int(map, "constraints-removed").unwrap_or(0),
        }
    }
}

impl StatementPlan {
    fn from_map(map: &PropMap) -> Option<Self> {
        let operator_type = get_str(map, "operatorType")?;
        let identifiers = get_list(map, "identifiers")
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let arguments = get_map(map, "args").unwrap_or_else(PropMap::empty);
        let children = get_list(map, "children")
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| match v {
                        Value::Map(child) => StatementPlan::from_map(child),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();
        let estimated_rows = get_int(map, "EstimatedRows");
        let db_hits = get_int(map, "dbHits");
        let rows = get_int(map, "rows");
        let page_cache_hits = get_int(map, "pageCacheHits");
        let page_cache_misses = get_int(map, "pageCacheMisses");
        Some(StatementPlan {
            operator_type,
            identifiers,
            arguments,
            children,
            estimated_rows,
            db_hits,
            rows,
            page_cache_hits,
            page_cache_misses,
        })
    }
}

impl SuccessMetadata {
    /// Parse a `SUCCESS` message's single `Map` argument. Keys this
    /// extractor doesn't recognize are preserved in [`Self::extra`]
    /// untouched.
    pub fn from_value(value: &Value) -> SuccessMetadata {
        let map = match value {
            Value::Map(m) => m.clone(),
            _ => PropMap::empty(),
        };

        let fields = get_list(&map, "fields")
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let statement_type = get_str(&map, "type").and_then(|s| StatementType::from_code(&s));
        let stats = get_map(&map, "stats").as_ref().map(StatementStats::from_map);
        let plan = get_map(&map, "plan").as_ref().and_then(StatementPlan::from_map);
        let profile = get_map(&map, "profile").as_ref().and_then(StatementPlan::from_map);
        let bookmark = get_str(&map, "bookmark");
        let result_available_after_ms = get_int(&map, "result_available_after");
        let result_consumed_after_ms = get_int(&map, "result_consumed_after");

        let recognized: &[&str] = &[
            "fields",
            "type",
            "stats",
            "plan",
            "profile",
            "bookmark",
            "result_available_after",
            "result_consumed_after",
        ];
        let extra = PropMap::new(
            map.iter()
                .filter(|(k, _)| !recognized.contains(k))
                .map(|(k, v)| (Arc::from(k), v.clone()))
                .collect::<Vec<_>>(),
        );

        SuccessMetadata {
            fields,
            statement_type,
            stats,
            plan,
            profile,
            bookmark,
            result_available_after_ms,
            result_consumed_after_ms,
            extra,
        }
    }

    /// Parse a `RUN`-response `SUCCESS`, which §4.7 requires to carry a
    /// `fields` list naming the columns the subsequent pull will stream
    /// rows for. Unlike [`Self::from_value`] (used for every other
    /// `SUCCESS`, where `fields` is legitimately absent), this is strict:
    /// a missing or mistyped `fields` is a protocol violation, not an empty
    /// result.
    pub fn from_run_response(value: &Value) -> Result<SuccessMetadata, BoltError> {
        let map = match value {
            Value::Map(m) => m,
            other => {
                tracing::debug!(?other, "RUN SUCCESS argument is not a Map");
                return Err(protocol_violation("RUN response must be a Map"));
            }
        };
        let items = match map.get("fields") {
            Some(Value::List(items)) => items,
            other => {
                tracing::debug!(?other, "RUN SUCCESS missing or mistyped required field `fields`");
                return Err(protocol_violation("RUN response missing required field `fields`"));
            }
        };
        let mut fields = Vec::with_capacity(items.len());
        for item in items.iter() {
            match item {
                Value::String(s) => fields.push(s.clone()),
                other => {
                    tracing::debug!(?other, "RUN SUCCESS `fields` entry is not a String");
                    return Err(protocol_violation("RUN response `fields` entries must be Strings"));
                }
            }
        }

        let mut meta = SuccessMetadata::from_value(value);
        meta.fields = fields;
        Ok(meta)
    }
}

/// Extract a `code`/`message` pair from a `FAILURE` message's `Map`
/// argument, parsing a trailing source-position suffix out of `message`
/// when the server included one. Both fields are required by §4.7; a
/// missing or mistyped one is a protocol violation, not a default value.
pub fn extract_failure(value: &Value) -> Result<(String, String, Option<FailureDetails>), BoltError> {
    let map = match value {
        Value::Map(m) => m,
        other => {
            tracing::debug!(?other, "FAILURE argument is not a Map");
            return Err(protocol_violation("FAILURE argument must be a Map"));
        }
    };
    let code = match get_str(map, "code") {
        Some(s) => s.to_string(),
        None => {
            tracing::debug!(?map, "FAILURE missing or mistyped required field `code`");
            return Err(protocol_violation("FAILURE missing required field `code`"));
        }
    };
    let message = match get_str(map, "message") {
        Some(s) => s.to_string(),
        None => {
            tracing::debug!(?map, "FAILURE missing or mistyped required field `message`");
            return Err(protocol_violation("FAILURE missing required field `message`"));
        }
    };
    let details = FailureDetails::parse(&message);
    Ok((code, message, details))
}

/// Whether a `FAILURE` status code names an authentication problem rather
/// than an ordinary statement failure (§7's "Authentication errors ...
/// surfaced to the initialise path"), and if so, whether it's specifically
/// a rate-limit (retryable by the caller without new credentials).
pub fn classify_auth_failure(code: &str) -> Option<bool> {
    match code {
        "Neo.ClientError.Security.Unauthorized" | "Neo.ClientError.Security.AuthenticationRateLimit" => {
            Some(code.ends_with("AuthenticationRateLimit"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(PropMap::new(
            entries.into_iter().map(|(k, v)| (Arc::from(k), v)).collect::<Vec<_>>(),
        ))
    }

    #[test]
    fn extracts_field_names() {
        let value = map(vec![("fields", Value::from(vec![Value::from("n"), Value::from("m")]))]);
        let meta = SuccessMetadata::from_value(&value);
        assert_eq!(meta.fields, vec![Arc::from("n"), Arc::from("m")]);
    }

    #[test]
    fn extracts_stats_counters() {
        let stats = map(vec![("nodes-created", Value::Int(3)), ("properties-set", Value::Int(7))]);
        let value = map(vec![("stats", stats)]);
        let meta = SuccessMetadata::from_value(&value);
        let stats = meta.stats.unwrap();
        assert_eq!(stats.nodes_created, 3);
        assert_eq!(stats.properties_set, 7);
        assert_eq!(stats.nodes_deleted, 0);
    }

    #[test]
    fn extracts_statement_type() {
        let value = map(vec![("type", Value::from("rw"))]);
        let meta = SuccessMetadata::from_value(&value);
        assert_eq!(meta.statement_type, Some(StatementType::ReadWrite));
    }

    #[test]
    fn unrecognized_keys_land_in_extra() {
        let value = map(vec![("db", Value::from("neo4j")), ("fields", Value::from(Vec::<Value>::new()))]);
        let meta = SuccessMetadata::from_value(&value);
        assert_eq!(meta.extra.get("db"), Some(&Value::from("neo4j")));
        assert_eq!(meta.extra.get("fields"), None);
    }

    #[test]
    fn classify_auth_failure_distinguishes_rate_limit_from_plain_unauthorized() {
        assert_eq!(classify_auth_failure("Neo.ClientError.Security.Unauthorized"), Some(false));
        assert_eq!(
            classify_auth_failure("Neo.ClientError.Security.AuthenticationRateLimit"),
            Some(true)
        );
        assert_eq!(classify_auth_failure("Neo.ClientError.Statement.SyntaxError"), None);
    }

    #[test]
    fn extract_failure_parses_position_suffix() {
        let value = map(vec![
            ("code", Value::from("Neo.ClientError.Statement.SyntaxError")),
            ("message", Value::from("bad query (line 2, column 3 (offset: 10))")),
        ]);
        let (code, message, details) = extract_failure(&value).unwrap();
        assert_eq!(code, "Neo.ClientError.Statement.SyntaxError");
        assert!(message.contains("bad query"));
        let details = details.unwrap();
        assert_eq!(details.line, 2);
        assert_eq!(details.offset, 10);
    }

    #[test]
    fn extract_failure_rejects_missing_code() {
        let value = map(vec![("message", Value::from("bad query"))]);
        let err = extract_failure(&value).unwrap_err();
        assert_eq!(err.code(), bolt_wire::ErrorCode::ProtocolViolation);
    }

    #[test]
    fn extract_failure_rejects_mistyped_message() {
        let value = map(vec![
            ("code", Value::from("Neo.ClientError.Statement.SyntaxError")),
            ("message", Value::Int(1)),
        ]);
        assert!(extract_failure(&value).is_err());
    }

    #[test]
    fn extract_failure_rejects_non_map_argument() {
        assert!(extract_failure(&Value::Null).is_err());
    }

    #[test]
    fn from_run_response_parses_fields() {
        let value = map(vec![("fields", Value::from(vec![Value::from("n"), Value::from("m")]))]);
        let meta = SuccessMetadata::from_run_response(&value).unwrap();
        assert_eq!(meta.fields, vec![Arc::from("n"), Arc::from("m")]);
    }

    #[test]
    fn from_run_response_rejects_missing_fields() {
        let value = map(vec![("type", Value::from("r"))]);
        assert!(SuccessMetadata::from_run_response(&value).is_err());
    }

    #[test]
    fn from_run_response_rejects_mistyped_fields() {
        let value = map(vec![("fields", Value::Map(PropMap::empty()))]);
        assert!(SuccessMetadata::from_run_response(&value).is_err());
    }

    #[test]
    fn from_run_response_rejects_non_string_field_entries() {
        let value = map(vec![("fields", Value::from(vec![Value::Int(1)]))]);
        assert!(SuccessMetadata::from_run_response(&value).is_err());
    }
}
