//! The `Sort` operator (spec §4.4).
//!
//! Two variants share one struct: the default buffers every upstream
//! record before emitting, sorted; `Sort::streaming` trusts the input
//! is already close to sorted (the group-by streaming fast path feeds
//! it) and emits each upstream batch re-ordered in O(1) additional
//! memory rather than accumulating across the whole stream.

use crate::expr::KeyExpr;
use crate::processor::Processor;
use std::cmp::Ordering;
use zq_core::{Batch, Record, Result, Value};

/// One sort key plus its direction.
pub struct SortKey {
    pub expr: KeyExpr,
    pub ascending: bool,
}

impl SortKey {
    pub fn new(expr: KeyExpr, ascending: bool) -> Self {
        SortKey { expr, ascending }
    }
}

enum Mode {
    /// Accumulate every upstream record, emit once at EOS.
    Buffered { buffer: Vec<Record>, emitted: bool },
    /// Sort each batch independently as it arrives — correct only
    /// when the caller already knows each batch is internally
    /// unordered but the stream as a whole doesn't need a global
    /// merge (e.g. re-imposing order right after group-by's streaming
    /// fast path, which already emits in key order across batches).
    Streaming,
}

pub struct Sort {
    parent: Box<dyn Processor>,
    keys: Vec<SortKey>,
    mode: Mode,
}

impl Sort {
    /// The unbounded-buffering variant (spec §4.4 "Sort(keys, dir)").
    pub fn new(parent: Box<dyn Processor>, keys: Vec<SortKey>) -> Self {
        Sort {
            parent,
            keys,
            mode: Mode::Buffered {
                buffer: Vec::new(),
                emitted: false,
            },
        }
    }

    /// The O(1)-memory variant for already-sorted input (spec §4.4
    /// "For sorted inputs... a streaming variant emits in O(1)
    /// additional memory").
    pub fn streaming(parent: Box<dyn Processor>, keys: Vec<SortKey>) -> Self {
        Sort {
            parent,
            keys,
            mode: Mode::Streaming,
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let av = (key.expr)(a);
            let bv = (key.expr)(b);
            let ord = compare_values(&av, &bv);
            let ord = if key.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Order two dynamically typed values. Unset sorts first; values of
/// differing type fall back to comparing their type tag so the sort
/// is total even across the multi-type groups group-by can produce.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Unset, Value::Unset) => Ordering::Equal,
        (Value::Unset, _) => Ordering::Less,
        (_, Value::Unset) => Ordering::Greater,
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::Time(x), Value::Time(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Bytes(x), Value::Bytes(y)) => x.cmp(y),
        (Value::Ip(x), Value::Ip(y)) => x.cmp(y),
        _ if a.type_tag() == b.type_tag() => a.key_bytes().cmp(&b.key_bytes()),
        _ => a.type_tag().cmp(&b.type_tag()),
    }
}

impl Processor for Sort {
    fn pull(&mut self) -> Result<Option<Batch>> {
        match &mut self.mode {
            Mode::Streaming => match self.parent.pull()? {
                Some(batch) => {
                    let mut records: Vec<Record> = batch.records().to_vec();
                    let _ = batch.release();
                    records.sort_by(|a, b| self.compare(a, b));
                    Ok(Some(Batch::new(records)))
                }
                None => Ok(None),
            },
            Mode::Buffered { emitted, .. } if *emitted => Ok(None),
            Mode::Buffered { .. } => {
                loop {
                    match self.parent.pull()? {
                        Some(batch) => {
                            if let Mode::Buffered { buffer, .. } = &mut self.mode {
                                buffer.extend_from_slice(batch.records());
                            }
                            let _ = batch.release();
                        }
                        None => break,
                    }
                }
                let Mode::Buffered { buffer, emitted } = &mut self.mode else {
                    unreachable!()
                };
                *emitted = true;
                if buffer.is_empty() {
                    return Ok(None);
                }
                let mut records = std::mem::take(buffer);
                records.sort_by(|a, b| self.compare(a, b));
                Ok(Some(Batch::new(records)))
            }
        }
    }

    fn done(&mut self) {
        self.parent.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::Context;
    use crate::scan::Scan;
    use zq_core::TypeId;

    fn rec(key1: &str, n: i64) -> Record {
        Record::new(
            TypeId(0),
            vec![
                ("key1".into(), Value::String(key1.into())),
                ("n".into(), Value::Int(n)),
            ],
        )
    }

    fn key1_ascending() -> Vec<SortKey> {
        vec![SortKey::new(crate::expr::field("key1"), true)]
    }

    #[test]
    fn buffered_sort_orders_across_batches() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(
            ctx,
            vec![
                Batch::new(vec![rec("b", 1), rec("a", 1)]),
                Batch::new(vec![rec("c", 1)]),
            ],
        ));
        let mut sort = Sort::new(parent, key1_ascending());
        let out = sort.pull().unwrap().unwrap();
        let keys: Vec<_> = out
            .records()
            .iter()
            .map(|r| r.get("key1"))
            .collect();
        assert_eq!(
            keys,
            vec![
                Value::String("a".into()),
                Value::String("b".into()),
                Value::String("c".into())
            ]
        );
        assert!(sort.pull().unwrap().is_none());
    }

    #[test]
    fn s1_sort_matches_count_by_key1_example() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(
            ctx,
            vec![Batch::new(vec![rec("b", 1), rec("a", 2), rec("a", 1)])],
        ));
        let mut sort = Sort::new(parent, key1_ascending());
        let out = sort.pull().unwrap().unwrap();
        let keys: Vec<_> = out.records().iter().map(|r| r.get("key1")).collect();
        assert_eq!(
            keys,
            vec![
                Value::String("a".into()),
                Value::String("a".into()),
                Value::String("b".into())
            ]
        );
    }

    #[test]
    fn unset_keys_sort_first() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(
            ctx,
            vec![Batch::new(vec![
                rec("a", 1),
                Record::new(TypeId(0), vec![("key1".into(), Value::Unset)]),
            ])],
        ));
        let mut sort = Sort::new(parent, key1_ascending());
        let out = sort.pull().unwrap().unwrap();
        assert_eq!(out.records()[0].get("key1"), Value::Unset);
    }

    #[test]
    fn streaming_mode_sorts_each_batch_independently() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(ctx, vec![Batch::new(vec![rec("b", 1), rec("a", 1)])]));
        let mut sort = Sort::streaming(parent, key1_ascending());
        let out = sort.pull().unwrap().unwrap();
        assert_eq!(out.records()[0].get("key1"), Value::String("a".into()));
    }

    #[test]
    fn descending_direction_reverses_order() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(ctx, vec![Batch::new(vec![rec("a", 1), rec("b", 1)])]));
        let mut sort = Sort::new(
            parent,
            vec![SortKey::new(crate::expr::field("key1"), false)],
        );
        let out = sort.pull().unwrap().unwrap();
        assert_eq!(out.records()[0].get("key1"), Value::String("b".into()));
    }

    #[test]
    fn empty_input_yields_eos_not_empty_batch() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(ctx, vec![]));
        let mut sort = Sort::new(parent, key1_ascending());
        assert!(sort.pull().unwrap().is_none());
    }
}
