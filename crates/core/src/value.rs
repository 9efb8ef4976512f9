//! Minimal value representation standing in for the full zq value
//! encoding and type system (spec §1 treats the expression language and
//! event codec as an external collaborator; this is the boundary type
//! a [`crate::record::Record`] and the group-by reducers operate on).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::net::IpAddr;

/// A dynamically typed scalar or composite value.
///
/// `Value::Unset` is distinct from any other value and is what a
/// missing or null field evaluates to; spec §4.7 requires that group-by
/// keys containing an unset field still form a valid, distinct group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Null / missing field.
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Ip(IpAddr),
    /// Nanoseconds since the Unix epoch.
    Time(i64),
    /// A nested record, field order preserved.
    Record(Vec<(String, Value)>),
    Array(Vec<Value>),
}

impl Value {
    /// The type tag used for multi-type fan-out keying (spec §4.7).
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Unset => TypeTag::Unset,
            Value::Bool(_) => TypeTag::Bool,
            Value::Int(_) => TypeTag::Int,
            Value::Float(_) => TypeTag::Float,
            Value::String(_) => TypeTag::String,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::Ip(_) => TypeTag::Ip,
            Value::Time(_) => TypeTag::Time,
            Value::Record(_) => TypeTag::Record,
            Value::Array(_) => TypeTag::Array,
        }
    }

    /// True for [`Value::Unset`].
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    /// Look up a dotted path (`"a.b.c"`) into nested records.
    ///
    /// Missing intermediate fields yield [`Value::Unset`], per spec
    /// §4.7 "Record-valued keys".
    pub fn lookup_path(&self, path: &str) -> Value {
        let mut cur = self;
        for part in path.split('.') {
            match cur {
                Value::Record(fields) => {
                    match fields.iter().find(|(name, _)| name == part) {
                        Some((_, v)) => cur = v,
                        None => return Value::Unset,
                    }
                }
                _ => return Value::Unset,
            }
        }
        cur.clone()
    }

    /// A stable byte encoding used as the "bytes" half of a composite
    /// group-by key (spec §4.7: "tuple of (expression-result-type,
    /// bytes)"). Not a general serialization format — just needs to be
    /// injective enough to distinguish distinct values of the same
    /// type.
    pub fn key_bytes(&self) -> Vec<u8> {
        match self {
            Value::Unset => vec![],
            Value::Bool(b) => vec![*b as u8],
            Value::Int(i) => i.to_be_bytes().to_vec(),
            Value::Float(f) => f.to_be_bytes().to_vec(),
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Bytes(b) => b.clone(),
            Value::Ip(ip) => match ip {
                IpAddr::V4(v4) => v4.octets().to_vec(),
                IpAddr::V6(v6) => v6.octets().to_vec(),
            },
            Value::Time(t) => t.to_be_bytes().to_vec(),
            Value::Record(fields) => fields
                .iter()
                .flat_map(|(k, v)| {
                    k.as_bytes()
                        .iter()
                        .copied()
                        .chain(v.key_bytes())
                        .collect::<Vec<u8>>()
                })
                .collect(),
            Value::Array(items) => items.iter().flat_map(|v| v.key_bytes()).collect(),
        }
    }

    /// Numeric coercion used by the `sum`/`avg`/`min`/`max` reducers.
    /// Returns `None` for non-numeric values (the reducer then ignores
    /// the input, per spec §4.7).
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(*i)),
            Value::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }
}

/// A type discriminant used for group-by multi-type fan-out and for
/// reducer input validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeTag {
    Unset,
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Ip,
    Time,
    Record,
    Array,
}

/// A numeric value that conservatively widens int -> float on mixed
/// input, per spec §4.7 "Mixed-typed inputs to a numeric reducer
/// promote conservatively".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Add two numbers, widening to float if either operand is a float.
    pub fn add(self, other: Number) -> Number {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a + b),
            _ => Number::Float(self.as_f64() + other.as_f64()),
        }
    }

    pub fn partial_cmp(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }

    /// Render back into a [`Value`] (int stays int unless it was
    /// widened).
    pub fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}
