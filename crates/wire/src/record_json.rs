//! `Record`/`Value` -> `serde_json::Value` projection, used by every
//! encoder in this crate (spec §4.9, §6 "all JSON unless noted").
//!
//! This is a one-way projection: `Value::Unset` becomes JSON `null`,
//! and `Value::Ip`/`Value::Time`/`Value::Bytes` get a textual
//! rendering since plain JSON has no native types for them. Round-
//! tripping back into a [`zq_core::Record`] is out of scope — the
//! event codec itself is an external collaborator (spec §1).

use serde_json::{json, Map, Value as Json};
use zq_core::{Record, TypeTable, Value};

/// Render one value as JSON.
pub fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Unset => Json::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::String(s) => json!(s),
        Value::Bytes(b) => json!(base64_encode(b)),
        Value::Ip(ip) => json!(ip.to_string()),
        Value::Time(t) => json!(t),
        Value::Record(fields) => {
            let mut map = Map::with_capacity(fields.len());
            for (name, v) in fields {
                map.insert(name.clone(), value_to_json(v));
            }
            Json::Object(map)
        }
        Value::Array(items) => Json::Array(items.iter().map(value_to_json).collect()),
    }
}

/// Render a whole record as a JSON object, field order preserved.
pub fn record_to_json(record: &Record) -> Json {
    let mut map = Map::with_capacity(record.fields().len());
    for (name, value) in record.fields() {
        map.insert(name.clone(), value_to_json(value));
    }
    Json::Object(map)
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Render one JSON value as a [`Value`]. Used by log ingest (spec §6
/// `POST /log/{space}`) where a line of input NDJSON is the concrete
/// stand-in this workspace uses for the out-of-scope event codec (spec
/// §1 treats the value encoding as an external collaborator; reading
/// it back from JSON rather than the real binary format is the
/// simplification this crate makes, noted in DESIGN.md).
///
/// JSON has no native IP/bytes/time type, so everything that isn't an
/// object/array/bool/number/null comes back as `Value::String` — a
/// query comparing against an IP literal must coerce, the same way the
/// real value codec's reader would need a declared field type to do
/// so. `null` becomes [`Value::Unset`], matching spec §4.7's null-key
/// semantics.
pub fn json_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Unset,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(json_to_value).collect()),
        Json::Object(map) => Value::Record(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_value(v)))
                .collect(),
        ),
    }
}

/// Decode one JSON object into a [`Record`], interning its shape into
/// `types` (spec §3 "a unique per-process type handle" — here scoped
/// to the ingest transaction's own [`TypeTable`] rather than a true
/// process-wide context, since nothing downstream needs cross-space
/// type identity).
pub fn json_to_record(json: &Json, types: &mut TypeTable) -> Option<Record> {
    let obj = json.as_object()?;
    let fields: Vec<(String, Value)> = obj
        .iter()
        .map(|(k, v)| (k.clone(), json_to_value(v)))
        .collect();
    let type_id = types.type_of(&fields);
    Some(Record::new(type_id, fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::TypeId;

    #[test]
    fn unset_becomes_null() {
        assert_eq!(value_to_json(&Value::Unset), Json::Null);
    }

    #[test]
    fn record_preserves_field_values() {
        let r = Record::new(
            TypeId(0),
            vec![("n".into(), Value::Int(1)), ("s".into(), Value::String("a".into()))],
        );
        let v = record_to_json(&r);
        assert_eq!(v["n"], json!(1));
        assert_eq!(v["s"], json!("a"));
    }

    #[test]
    fn nested_record_becomes_nested_object() {
        let r = Record::new(
            TypeId(0),
            vec![("a".into(), Value::Record(vec![("b".into(), Value::Int(2))]))],
        );
        let v = record_to_json(&r);
        assert_eq!(v["a"]["b"], json!(2));
    }

    #[test]
    fn ip_renders_as_string() {
        use std::net::{IpAddr, Ipv4Addr};
        let r = Record::new(
            TypeId(0),
            vec![("ip".into(), Value::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))))],
        );
        let v = record_to_json(&r);
        assert_eq!(v["ip"], json!("10.0.0.1"));
    }

    #[test]
    fn json_object_decodes_to_record_with_fields_in_order() {
        let mut types = TypeTable::new();
        let json: Json = serde_json::from_str(r#"{"a":1,"b":"x","c":null}"#).unwrap();
        let r = json_to_record(&json, &mut types).unwrap();
        assert_eq!(r.get("a"), Value::Int(1));
        assert_eq!(r.get("b"), Value::String("x".into()));
        assert_eq!(r.get("c"), Value::Unset);
    }

    #[test]
    fn json_non_object_does_not_decode() {
        let mut types = TypeTable::new();
        let json: Json = serde_json::from_str("42").unwrap();
        assert!(json_to_record(&json, &mut types).is_none());
    }

    #[test]
    fn records_with_identical_shape_share_a_type_id() {
        let mut types = TypeTable::new();
        let a: Json = serde_json::from_str(r#"{"n":1}"#).unwrap();
        let b: Json = serde_json::from_str(r#"{"n":2}"#).unwrap();
        let ra = json_to_record(&a, &mut types).unwrap();
        let rb = json_to_record(&b, &mut types).unwrap();
        assert_eq!(ra.type_id(), rb.type_id());
    }

    #[test]
    fn nested_json_object_becomes_nested_record_value() {
        let mut types = TypeTable::new();
        let json: Json = serde_json::from_str(r#"{"a":{"b":2}}"#).unwrap();
        let r = json_to_record(&json, &mut types).unwrap();
        assert_eq!(r.get("a.b"), Value::Int(2));
    }

    #[test]
    fn json_round_trips_through_value_to_json_for_plain_scalars() {
        let mut types = TypeTable::new();
        let json: Json = serde_json::from_str(r#"{"n":7,"s":"hi","b":true}"#).unwrap();
        let r = json_to_record(&json, &mut types).unwrap();
        let back = record_to_json(&r);
        assert_eq!(back["n"], json!(7));
        assert_eq!(back["s"], json!("hi"));
        assert_eq!(back["b"], json!(true));
    }
}
