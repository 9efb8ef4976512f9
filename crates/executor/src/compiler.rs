//! Compiles a parsed `proc` program tree (spec §3 "Program AST") into a
//! runnable [`Processor`] tree.
//!
//! Spec §1 scopes the real expression language out as an external
//! collaborator producing an AST we merely consume. Nothing in the
//! retrieved corpus hands us that parser, so this module defines the
//! minimal JSON surface the wire protocol's `SearchRequest.proc` field
//! actually carries here: a discriminated node per spec §3's closed set
//! (`filter`, `groupby`, `head`, `tail`, `sort`, `sequential`,
//! `parallel`), plus a `scan` leaf and a small comparison-expression
//! grammar for `filter` predicates. A fuller language is out of scope;
//! this is the seam, not the feature.

use crate::expr::{field, KeyExpr, Predicate};
use crate::groupby::{every_key, key as group_key, GroupBy, GroupKey, ReducerSpec};
use crate::mux::Multiplexer;
use crate::processor::{Context, Processor};
use crate::sort::{Sort, SortKey};
use crate::{Filter, Head, Tail};
use serde_json::Value as Json;
use std::cmp::Ordering;
use std::sync::Arc;
use zq_core::{Error, Record, Result, Value};

/// A parsed program node (spec §3's discriminated tree).
pub enum ProgramNode {
    /// Consume the next not-yet-claimed scan leaf, in order.
    Scan,
    Filter(Json),
    GroupBy {
        keys: Vec<(String, String)>,
        every_ns: Option<i64>,
        reducers: Vec<(String, String, Option<String>)>,
        streaming: bool,
    },
    Head(usize),
    Tail(usize),
    Sort {
        keys: Vec<(String, bool)>,
        streaming: bool,
    },
    Sequential(Vec<ProgramNode>),
    Parallel(Vec<ProgramNode>),
}

/// Parse a `proc` JSON value into a [`ProgramNode`] tree.
pub fn parse(json: &Json) -> Result<ProgramNode> {
    let kind = json
        .get("kind")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::invalid("proc node missing \"kind\""))?;
    match kind {
        "scan" => Ok(ProgramNode::Scan),
        "filter" => {
            let expr = json
                .get("predicate")
                .cloned()
                .ok_or_else(|| Error::invalid("filter node missing \"predicate\""))?;
            Ok(ProgramNode::Filter(expr))
        }
        "groupby" => {
            let keys = json
                .get("keys")
                .and_then(Json::as_array)
                .map(|a| parse_key_list(a))
                .transpose()?
                .unwrap_or_default();
            let every_ns = json.get("every_ns").and_then(Json::as_i64);
            let reducers = json
                .get("reducers")
                .and_then(Json::as_array)
                .ok_or_else(|| Error::invalid("groupby node missing \"reducers\""))?
                .iter()
                .map(parse_reducer)
                .collect::<Result<Vec<_>>>()?;
            let streaming = json
                .get("streaming")
                .and_then(Json::as_bool)
                .unwrap_or(false);
            Ok(ProgramNode::GroupBy {
                keys,
                every_ns,
                reducers,
                streaming,
            })
        }
        "head" => Ok(ProgramNode::Head(parse_usize(json, "n")?)),
        "tail" => Ok(ProgramNode::Tail(parse_usize(json, "n")?)),
        "sort" => {
            let keys = json
                .get("keys")
                .and_then(Json::as_array)
                .ok_or_else(|| Error::invalid("sort node missing \"keys\""))?
                .iter()
                .map(|k| {
                    let path = k
                        .get("path")
                        .and_then(Json::as_str)
                        .ok_or_else(|| Error::invalid("sort key missing \"path\""))?;
                    let ascending = k.get("ascending").and_then(Json::as_bool).unwrap_or(true);
                    Ok((path.to_string(), ascending))
                })
                .collect::<Result<Vec<_>>>()?;
            let streaming = json
                .get("streaming")
                .and_then(Json::as_bool)
                .unwrap_or(false);
            Ok(ProgramNode::Sort { keys, streaming })
        }
        "sequential" => Ok(ProgramNode::Sequential(parse_node_list(json, "ops")?)),
        "parallel" => Ok(ProgramNode::Parallel(parse_node_list(json, "ops")?)),
        other => Err(Error::invalid(format!("unknown proc kind: {other}"))),
    }
}

fn parse_node_list(json: &Json, field_name: &str) -> Result<Vec<ProgramNode>> {
    json.get(field_name)
        .and_then(Json::as_array)
        .ok_or_else(|| Error::invalid(format!("node missing \"{field_name}\"")))?
        .iter()
        .map(parse)
        .collect()
}

fn parse_usize(json: &Json, field_name: &str) -> Result<usize> {
    json.get(field_name)
        .and_then(Json::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| Error::invalid(format!("node missing integer \"{field_name}\"")))
}

fn parse_key_list(entries: &[Json]) -> Result<Vec<(String, String)>> {
    entries
        .iter()
        .map(|k| {
            let path = k
                .get("path")
                .and_then(Json::as_str)
                .ok_or_else(|| Error::invalid("groupby key missing \"path\""))?;
            let name = k
                .get("name")
                .and_then(Json::as_str)
                .unwrap_or(path)
                .to_string();
            Ok((name, path.to_string()))
        })
        .collect()
}

fn parse_reducer(json: &Json) -> Result<(String, String, Option<String>)> {
    let kind = json
        .get("kind")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::invalid("reducer missing \"kind\""))?
        .to_string();
    let output_name = json
        .get("name")
        .and_then(Json::as_str)
        .unwrap_or(&kind)
        .to_string();
    let input = json
        .get("input")
        .and_then(Json::as_str)
        .map(|s| s.to_string());
    Ok((output_name, kind, input))
}

/// Compile a parsed program against a set of already-opened scan leaves
/// (spec §4.6 step 2: "leaves are time-bounded scanners").
///
/// `ctx` must be the same context every leaf was built against, so
/// cancellation and the warnings sideband reach the whole tree.
pub fn compile_program(
    node: &ProgramNode,
    ctx: &Arc<Context>,
    leaves: Vec<Box<dyn Processor>>,
) -> Result<Box<dyn Processor>> {
    let mut leaves = leaves.into_iter();
    let out = compile(node, ctx, &mut leaves)?;
    if leaves.next().is_some() {
        return Err(Error::invalid("program did not consume every scan leaf"));
    }
    Ok(out)
}

fn compile(
    node: &ProgramNode,
    ctx: &Arc<Context>,
    leaves: &mut dyn Iterator<Item = Box<dyn Processor>>,
) -> Result<Box<dyn Processor>> {
    match node {
        ProgramNode::Scan => leaves
            .next()
            .ok_or_else(|| Error::invalid("program has more scan nodes than available leaves")),
        ProgramNode::Parallel(ops) => {
            let mut branches = Vec::with_capacity(ops.len());
            for op in ops {
                branches.push(compile(op, ctx, leaves)?);
            }
            Ok(Box::new(Multiplexer::new(ctx.clone(), branches)))
        }
        ProgramNode::Sequential(ops) => {
            let (first, rest) = ops
                .split_first()
                .ok_or_else(|| Error::invalid("sequential node has no stages"))?;
            let mut current = compile(first, ctx, leaves)?;
            for op in rest {
                current = apply_unary(op, current, ctx)?;
            }
            Ok(current)
        }
        unary => {
            // A bare unary op at the top of the tree implicitly reads
            // from a single upstream leaf (or, when more than one leaf
            // remains, from their multiplexed fan-in) — the common case
            // for a query with no explicit `parallel`/`sequential`
            // wrapping.
            let remaining: Vec<_> = leaves.collect();
            let parent: Box<dyn Processor> = match remaining.len() {
                0 => return Err(Error::invalid("program has no scan leaves to read from")),
                1 => remaining.into_iter().next().expect("len checked"),
                _ => Box::new(Multiplexer::new(ctx.clone(), remaining)),
            };
            apply_unary(unary, parent, ctx)
        }
    }
}

fn apply_unary(
    node: &ProgramNode,
    parent: Box<dyn Processor>,
    ctx: &Arc<Context>,
) -> Result<Box<dyn Processor>> {
    match node {
        ProgramNode::Filter(expr) => {
            let predicate = compile_predicate(expr)?;
            Ok(Box::new(Filter::new(parent, predicate)))
        }
        ProgramNode::GroupBy {
            keys,
            every_ns,
            reducers,
            streaming,
        } => {
            let mut group_keys: Vec<GroupKey> = Vec::with_capacity(keys.len());
            let mut keys_iter = keys.iter();
            if let Some(every_ns) = every_ns {
                let (name, path) = keys_iter
                    .next()
                    .ok_or_else(|| Error::invalid("every requires a leading key"))?;
                group_keys.push(every_key(name.clone(), path.clone(), *every_ns));
            }
            for (name, path) in keys_iter {
                group_keys.push(group_key(name.clone(), path.clone()));
            }
            let reducer_specs: Vec<ReducerSpec> = reducers
                .iter()
                .map(|(name, kind, input)| {
                    ReducerSpec::new(name.clone(), kind.clone(), input.as_ref().map(|p| field(p)))
                })
                .collect();
            Ok(Box::new(GroupBy::new(
                parent,
                ctx.clone(),
                group_keys,
                reducer_specs,
                *streaming || every_ns.is_some(),
            )))
        }
        ProgramNode::Head(n) => Ok(Box::new(Head::new(parent, *n))),
        ProgramNode::Tail(n) => Ok(Box::new(Tail::new(parent, *n))),
        ProgramNode::Sort { keys, streaming } => {
            let sort_keys: Vec<SortKey> = keys
                .iter()
                .map(|(path, ascending)| SortKey::new(field(path.clone()), *ascending))
                .collect();
            Ok(if *streaming {
                Box::new(Sort::streaming(parent, sort_keys))
            } else {
                Box::new(Sort::new(parent, sort_keys))
            })
        }
        ProgramNode::Scan | ProgramNode::Sequential(_) | ProgramNode::Parallel(_) => Err(
            Error::invalid("scan/sequential/parallel cannot appear mid-chain"),
        ),
    }
}

/// Compile a comparison-expression JSON node into a [`Predicate`].
///
/// Supported shapes: `{"op":"and"/"or","terms":[...]}`,
/// `{"op":"not","term":...}`, `{"op":"exists","field":...}`, and
/// `{"op":"eq"/"ne"/"gt"/"gte"/"lt"/"lte","field":...,"value":...}`.
fn compile_predicate(expr: &Json) -> Result<Predicate> {
    let op = expr
        .get("op")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::invalid("predicate missing \"op\""))?;
    match op {
        "and" => {
            let terms = compile_predicate_list(expr, "terms")?;
            Ok(Arc::new(move |r: &Record| terms.iter().all(|p| p(r))))
        }
        "or" => {
            let terms = compile_predicate_list(expr, "terms")?;
            Ok(Arc::new(move |r: &Record| terms.iter().any(|p| p(r))))
        }
        "not" => {
            let term = expr
                .get("term")
                .ok_or_else(|| Error::invalid("not missing \"term\""))?;
            let inner = compile_predicate(term)?;
            Ok(Arc::new(move |r: &Record| !inner(r)))
        }
        "exists" => {
            let path = predicate_field(expr)?;
            let extractor: KeyExpr = field(path);
            Ok(Arc::new(move |r: &Record| !extractor(r).is_unset()))
        }
        "eq" | "ne" | "gt" | "gte" | "lt" | "lte" => {
            let path = predicate_field(expr)?;
            let literal = expr
                .get("value")
                .cloned()
                .ok_or_else(|| Error::invalid(format!("{op} missing \"value\"")))?;
            let literal = json_literal_to_value(&literal);
            let extractor: KeyExpr = field(path);
            let op = op.to_string();
            Ok(Arc::new(move |r: &Record| {
                let v = extractor(r);
                match compare(&v, &literal) {
                    None => false,
                    Some(ord) => match op.as_str() {
                        "eq" => ord == Ordering::Equal,
                        "ne" => ord != Ordering::Equal,
                        "gt" => ord == Ordering::Greater,
                        "gte" => ord != Ordering::Less,
                        "lt" => ord == Ordering::Less,
                        "lte" => ord != Ordering::Greater,
                        _ => unreachable!(),
                    },
                }
            }))
        }
        other => Err(Error::invalid(format!("unknown predicate op: {other}"))),
    }
}

fn predicate_field(expr: &Json) -> Result<String> {
    expr.get("field")
        .and_then(Json::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| Error::invalid("predicate missing \"field\""))
}

fn compile_predicate_list(expr: &Json, field_name: &str) -> Result<Vec<Predicate>> {
    expr.get(field_name)
        .and_then(Json::as_array)
        .ok_or_else(|| Error::invalid(format!("predicate missing \"{field_name}\"")))?
        .iter()
        .map(compile_predicate)
        .collect()
}

fn json_literal_to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Unset,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(0.0)),
        },
        Json::String(s) => Value::String(s.clone()),
        _ => Value::Unset,
    }
}

/// Same ordering rules [`crate::sort::Sort`] uses internally, local to
/// this module since predicate comparisons need total ordering across
/// mixed int/float literals too.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Unset, Value::Unset) => Some(Ordering::Equal),
        (Value::Unset, _) | (_, Value::Unset) => None,
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::Ip(x), Value::Ip(y)) => Some(x.cmp(y)),
        _ if a.type_tag() == b.type_tag() => Some(a.key_bytes().cmp(&b.key_bytes())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::Scan;
    use zq_core::{Batch, TypeId};

    fn rec(key1: &str, n: i64) -> Record {
        Record::new(
            TypeId(0),
            vec![
                ("key1".into(), Value::String(key1.into())),
                ("n".into(), Value::Int(n)),
            ],
        )
    }

    fn leaf(ctx: &Arc<Context>, records: Vec<Record>) -> Box<dyn Processor> {
        Box::new(Scan::new(ctx.clone(), vec![Batch::new(records)]))
    }

    fn drain(p: &mut dyn Processor) -> Vec<Record> {
        let mut out = Vec::new();
        while let Some(b) = p.pull().unwrap() {
            out.extend(b.records().iter().cloned());
            let _ = b;
        }
        out
    }

    #[test]
    fn s1_filter_then_groupby_then_sort_matches_spec_example() {
        let ctx = Context::new();
        let leaves = vec![leaf(
            &ctx,
            vec![rec("a", 1), rec("a", 2), rec("b", 1)],
        )];
        let proc: Json = serde_json::from_str(
            r#"{
                "kind": "sequential",
                "ops": [
                    {"kind": "scan"},
                    {"kind": "groupby", "keys": [{"name":"key1","path":"key1"}],
                     "reducers": [{"name":"count","kind":"count"}]},
                    {"kind": "sort", "keys": [{"path":"key1","ascending":true}]}
                ]
            }"#,
        )
        .unwrap();
        let node = parse(&proc).unwrap();
        let mut compiled = compile_program(&node, &ctx, leaves).unwrap();
        let out = drain(compiled.as_mut());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("key1"), Value::String("a".into()));
        assert_eq!(out[0].get("count"), Value::Int(2));
        assert_eq!(out[1].get("key1"), Value::String("b".into()));
    }

    #[test]
    fn bare_groupby_root_auto_multiplexes_multiple_leaves() {
        let ctx = Context::new();
        let leaves = vec![
            leaf(&ctx, vec![rec("a", 1)]),
            leaf(&ctx, vec![rec("a", 1), rec("b", 1)]),
        ];
        let proc: Json = serde_json::from_str(
            r#"{"kind":"groupby","keys":[{"name":"key1","path":"key1"}],
                "reducers":[{"name":"count","kind":"count"}]}"#,
        )
        .unwrap();
        let node = parse(&proc).unwrap();
        let mut compiled = compile_program(&node, &ctx, leaves).unwrap();
        let out = drain(compiled.as_mut());
        let total: i64 = out.iter().map(|r| match r.get("count") {
            Value::Int(n) => n,
            _ => 0,
        }).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn filter_predicate_drops_non_matching_records() {
        let ctx = Context::new();
        let leaves = vec![leaf(&ctx, vec![rec("a", 1), rec("a", 2)])];
        let proc: Json = serde_json::from_str(
            r#"{"kind":"filter","predicate":{"op":"gt","field":"n","value":1}}"#,
        )
        .unwrap();
        let node = parse(&proc).unwrap();
        let mut compiled = compile_program(&node, &ctx, leaves).unwrap();
        let out = drain(compiled.as_mut());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("n"), Value::Int(2));
    }

    #[test]
    fn head_limits_total_records() {
        let ctx = Context::new();
        let leaves = vec![leaf(&ctx, vec![rec("a", 1), rec("a", 2), rec("a", 3)])];
        let proc: Json = serde_json::from_str(r#"{"kind":"head","n":2}"#).unwrap();
        let node = parse(&proc).unwrap();
        let mut compiled = compile_program(&node, &ctx, leaves).unwrap();
        assert_eq!(drain(compiled.as_mut()).len(), 2);
    }

    #[test]
    fn unknown_kind_is_rejected_as_invalid() {
        let proc: Json = serde_json::from_str(r#"{"kind":"bogus"}"#).unwrap();
        let err = parse(&proc).unwrap_err();
        assert_eq!(err.kind(), zq_core::Kind::Invalid);
    }

    #[test]
    fn and_or_not_compose() {
        let ctx = Context::new();
        let leaves = vec![leaf(&ctx, vec![rec("a", 1), rec("a", 5), rec("b", 5)])];
        let proc: Json = serde_json::from_str(
            r#"{"kind":"filter","predicate":{"op":"and","terms":[
                {"op":"eq","field":"key1","value":"a"},
                {"op":"not","term":{"op":"lt","field":"n","value":3}}
            ]}}"#,
        )
        .unwrap();
        let node = parse(&proc).unwrap();
        let mut compiled = compile_program(&node, &ctx, leaves).unwrap();
        let out = drain(compiled.as_mut());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("n"), Value::Int(5));
    }
}
