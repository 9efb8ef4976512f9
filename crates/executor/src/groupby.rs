//! The group-by aggregator (spec §4.7) — the most complex single
//! operator in the pipeline. Grounded on the seed scenarios in
//! `examples/original_source/proc/groupby_test.go` (reducer edge
//! cases, multi-type fan-out, unset-key handling, nested-key access,
//! forward/reverse streaming) since no Go implementation of the
//! operator itself was retrieved — only its test table.

use crate::expr::KeyExpr;
use crate::processor::{Context, Processor};
use crate::reducer::{self, Reducer};
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use zq_core::{Batch, Record, Result, TypeId, TypeTable, TypeTag, Value};

/// One key expression plus the bookkeeping group-by needs around it.
pub struct GroupKey {
    /// Output field name (supports `newkey=expr` assignment).
    pub name: String,
    pub expr: KeyExpr,
    /// The top-level field name this key reads, when it is a direct
    /// field reference. When the record's type does not carry this
    /// field at all the record is dropped rather than forming a null
    /// group (spec §4.7 "Records lacking a key field are dropped"). A
    /// key whose *value* resolves to unset because an intermediate
    /// nested field is itself unset still forms a valid group — only
    /// total absence of the top-level field drops the record.
    pub required_field: Option<String>,
}

/// Build a key from a dotted field path — the common case.
pub fn key(name: impl Into<String>, path: impl Into<String>) -> GroupKey {
    let path = path.into();
    let required_field = path.split('.').next().map(|s| s.to_string());
    GroupKey {
        name: name.into(),
        expr: crate::expr::field(path),
        required_field,
    }
}

/// Build the rewritten leading key for `every D` windowing: `floor(ts /
/// dur) * dur` (spec §4.7 "Windowed `every D`"). Assumes a time-typed
/// or integer-nanosecond field.
pub fn every_key(name: impl Into<String>, ts_field: impl Into<String>, dur_ns: i64) -> GroupKey {
    let name = name.into();
    let field_name = ts_field.into();
    let required_field = Some(field_name.clone());
    let expr: KeyExpr = {
        let field_name = field_name.clone();
        Arc::new(move |r: &Record| match r.get(&field_name) {
            Value::Time(t) => Value::Time(t.div_euclid(dur_ns) * dur_ns),
            Value::Int(t) => Value::Time(t.div_euclid(dur_ns) * dur_ns),
            _ => Value::Unset,
        })
    };
    GroupKey {
        name,
        expr,
        required_field,
    }
}

/// One named reducer over a (possibly absent, for `count()`) input
/// expression.
pub struct ReducerSpec {
    pub output_name: String,
    pub kind: String,
    pub input: Option<KeyExpr>,
}

impl ReducerSpec {
    pub fn new(output_name: impl Into<String>, kind: impl Into<String>, input: Option<KeyExpr>) -> Self {
        ReducerSpec {
            output_name: output_name.into(),
            kind: kind.into(),
            input,
        }
    }

    fn fresh(&self) -> Box<dyn Reducer> {
        reducer::make(&self.kind).unwrap_or_else(|| panic!("unknown reducer kind: {}", self.kind))
    }
}

struct GroupState {
    key_values: Vec<Value>,
    reducers: Vec<Box<dyn Reducer>>,
}

impl GroupState {
    fn consume(&mut self, reducers: &[ReducerSpec], record: &Record) {
        for (spec, reducer) in reducers.iter().zip(self.reducers.iter_mut()) {
            let v = match &spec.input {
                Some(expr) => expr(record),
                None => Value::Unset,
            };
            reducer.consume(&v);
        }
    }
}

/// A composite key's identity: the type tag of every key expression
/// plus their concatenated byte encoding (spec §4.7 "A composite key is
/// the tuple of (expression-result-type, bytes)").
type KeyId = (Vec<TypeTag>, Vec<u8>);

/// `count()` by default; either accumulates every group in a hash table
/// and flushes at EOS, or — when the caller declares the input is
/// sorted on the leading key — tracks only the one active group,
/// emitting it as soon as the key changes (spec §4.7).
pub struct GroupBy {
    parent: Box<dyn Processor>,
    ctx: Arc<Context>,
    keys: Vec<GroupKey>,
    reducers: Vec<ReducerSpec>,
    streaming: bool,
    active: Option<(KeyId, GroupState)>,
    table: FxHashMap<KeyId, GroupState>,
    pending: VecDeque<Batch>,
    types: TypeTable,
    parent_eos: bool,
}

impl GroupBy {
    /// `streaming_sorted`: caller declares the input is sorted on the
    /// leading key (spec §4.7 "Streaming-sorted fast path"; direction
    /// itself is not consulted by the algorithm, only trusted — we
    /// simply flush whenever the composite key changes, which holds
    /// for either forward or reverse sortedness).
    pub fn new(
        parent: Box<dyn Processor>,
        ctx: Arc<Context>,
        keys: Vec<GroupKey>,
        reducers: Vec<ReducerSpec>,
        streaming_sorted: bool,
    ) -> Self {
        GroupBy {
            parent,
            ctx,
            keys,
            reducers,
            streaming: streaming_sorted,
            active: None,
            table: FxHashMap::default(),
            pending: VecDeque::new(),
            types: TypeTable::new(),
            parent_eos: false,
        }
    }

    /// Evaluate this record's composite key. `None` means the record
    /// is dropped — one of its key expressions reads a field absent
    /// from the record's type entirely.
    fn record_key(&self, record: &Record) -> Option<(KeyId, Vec<Value>)> {
        let mut tags = Vec::with_capacity(self.keys.len());
        let mut bytes = Vec::new();
        let mut values = Vec::with_capacity(self.keys.len());
        for k in &self.keys {
            if let Some(required) = &k.required_field {
                if !record.fields().iter().any(|(name, _)| name == required) {
                    return None;
                }
            }
            let v = (k.expr)(record);
            tags.push(v.type_tag());
            bytes.extend(v.key_bytes());
            values.push(v);
        }
        Some(((tags, bytes), values))
    }

    fn build_record(&mut self, key_values: &[Value], reducers: &[Box<dyn Reducer>]) -> Record {
        let mut fields = Vec::with_capacity(self.keys.len() + self.reducers.len());
        for (k, v) in self.keys.iter().zip(key_values) {
            fields.push((k.name.clone(), v.clone()));
        }
        for (spec, r) in self.reducers.iter().zip(reducers) {
            fields.push((spec.output_name.clone(), r.result()));
        }
        let type_id = self.types.type_of(&fields);
        Record::new(type_id, fields)
    }

    fn new_group(&self) -> GroupState {
        GroupState {
            key_values: Vec::new(),
            reducers: self.reducers.iter().map(ReducerSpec::fresh).collect(),
        }
    }

    fn consume_streaming(&mut self, record: &Record) {
        let Some((id, values)) = self.record_key(record) else {
            return;
        };
        let flush = match &self.active {
            Some((active_id, _)) => *active_id != id,
            None => false,
        };
        if flush {
            self.flush_active();
        }
        if self.active.is_none() {
            let mut group = self.new_group();
            group.key_values = values;
            self.active = Some((id, group));
        }
        let (_, group) = self.active.as_mut().expect("just inserted");
        group.consume(&self.reducers, record);
    }

    fn flush_active(&mut self) {
        if let Some((_, group)) = self.active.take() {
            let rec = self.build_record(&group.key_values, &group.reducers);
            self.pending.push_back(Batch::new(vec![rec]));
        }
    }

    fn consume_unsorted(&mut self, record: &Record) {
        let Some((id, values)) = self.record_key(record) else {
            return;
        };
        if !self.table.contains_key(&id) {
            let mut group = self.new_group();
            group.key_values = values;
            self.table.insert(id.clone(), group);
        }
        let entry = self.table.get_mut(&id).expect("just inserted");
        entry.consume(&self.reducers, record);
    }

    /// Flush every accumulated group at EOS, bucketing by type-tuple
    /// so each distinct (type-tuple) is emitted as its own batch (spec
    /// §4.7 "Multi-type fan-out... emitted as separate typed batches").
    fn flush_unsorted(&mut self) {
        let mut buckets: FxHashMap<Vec<TypeTag>, Vec<Record>> = FxHashMap::default();
        for (id, group) in self.table.drain() {
            let (tags, _bytes) = id;
            let rec = {
                let mut fields = Vec::with_capacity(self.keys.len() + self.reducers.len());
                for (k, v) in self.keys.iter().zip(&group.key_values) {
                    fields.push((k.name.clone(), v.clone()));
                }
                for (spec, r) in self.reducers.iter().zip(&group.reducers) {
                    fields.push((spec.output_name.clone(), r.result()));
                }
                let type_id: TypeId = self.types.type_of(&fields);
                Record::new(type_id, fields)
            };
            buckets.entry(tags).or_default().push(rec);
        }
        for (_, records) in buckets {
            self.pending.push_back(Batch::new(records));
        }
    }
}

impl Processor for GroupBy {
    fn pull(&mut self) -> Result<Option<Batch>> {
        loop {
            if let Some(batch) = self.pending.pop_front() {
                return Ok(Some(batch));
            }
            if self.parent_eos {
                return Ok(None);
            }
            if self.ctx.is_cancelled() {
                return Err(zq_core::Error::internal("group-by cancelled"));
            }
            match self.parent.pull()? {
                Some(batch) => {
                    for record in batch.records() {
                        if self.streaming {
                            self.consume_streaming(record);
                        } else {
                            self.consume_unsorted(record);
                        }
                    }
                    let _ = batch.release();
                }
                None => {
                    self.parent_eos = true;
                    if self.streaming {
                        self.flush_active();
                    } else {
                        self.flush_unsorted();
                    }
                }
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
    use crate::scan::Scan;
    use zq_core::TypeId;

    fn rec(fields: Vec<(&str, Value)>) -> Record {
        Record::new(
            TypeId(0),
            fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )
    }

    fn count_groupby(parent: Box<dyn Processor>, streaming: bool) -> GroupBy {
        GroupBy::new(
            parent,
            Context::new(),
            vec![key("key1", "key1")],
            vec![ReducerSpec::new("count", "count", None)],
            streaming,
        )
    }

    fn drain_sorted(gb: &mut GroupBy) -> Vec<Record> {
        let mut out = Vec::new();
        while let Some(batch) = gb.pull().unwrap() {
            out.extend(batch.records().iter().cloned());
        }
        out.sort_by(|a, b| format!("{:?}", a.get("key1")).cmp(&format!("{:?}", b.get("key1"))));
        out
    }

    #[test]
    fn s1_simple_groupby() {
        let ctx = Context::new();
        let batch = Batch::new(vec![
            rec(vec![("key1", Value::String("a".into())), ("n", Value::Int(1))]),
            rec(vec![("key1", Value::String("a".into())), ("n", Value::Int(2))]),
            rec(vec![("key1", Value::String("b".into())), ("n", Value::Int(1))]),
        ]);
        let parent = Box::new(Scan::new(ctx, vec![batch]));
        let mut gb = count_groupby(parent, false);
        let out = drain_sorted(&mut gb);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("key1"), Value::String("a".into()));
        assert_eq!(out[0].get("count"), Value::Int(2));
        assert_eq!(out[1].get("key1"), Value::String("b".into()));
        assert_eq!(out[1].get("count"), Value::Int(1));
    }

    #[test]
    fn s2_unset_keys_form_their_own_group() {
        let ctx = Context::new();
        let batch = Batch::new(vec![
            rec(vec![("key1", Value::String("a".into())), ("n", Value::Int(1))]),
            rec(vec![("key1", Value::String("a".into())), ("n", Value::Int(2))]),
            rec(vec![("key1", Value::String("b".into())), ("n", Value::Int(1))]),
            rec(vec![("key1", Value::Unset), ("n", Value::Int(3))]),
            rec(vec![("key1", Value::Unset), ("n", Value::Int(4))]),
        ]);
        let parent = Box::new(Scan::new(ctx, vec![batch]));
        let mut gb = count_groupby(parent, false);
        let out = drain_sorted(&mut gb);
        assert_eq!(out.len(), 3);
        let null_group = out.iter().find(|r| r.get("key1") == Value::Unset).unwrap();
        assert_eq!(null_group.get("count"), Value::Int(2));
    }

    #[test]
    fn records_missing_the_key_field_entirely_are_dropped() {
        let ctx = Context::new();
        let batch = Batch::new(vec![
            rec(vec![("key1", Value::String("a".into()))]),
            rec(vec![("key3", Value::String("other".into()))]),
        ]);
        let parent = Box::new(Scan::new(ctx, vec![batch]));
        let mut gb = count_groupby(parent, false);
        let out = drain_sorted(&mut gb);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("key1"), Value::String("a".into()));
        assert_eq!(out[0].get("count"), Value::Int(1));
    }

    #[test]
    fn s3_multi_type_fanout_emits_separate_typed_batches() {
        use std::net::{IpAddr, Ipv4Addr};
        let ctx = Context::new();
        let ip = |o: u8| Value::Ip(IpAddr::V4(Ipv4Addr::new(10, 0, 0, o)));
        let batch = Batch::new(vec![
            rec(vec![("key1", ip(1))]),
            rec(vec![("key1", ip(2))]),
            rec(vec![("key1", ip(1))]),
            rec(vec![("key1", Value::String("a".into()))]),
            rec(vec![("key1", Value::String("a".into()))]),
            rec(vec![("key1", Value::String("b".into()))]),
        ]);
        let parent = Box::new(Scan::new(ctx, vec![batch]));
        let mut gb = count_groupby(parent, false);

        let mut batches = Vec::new();
        while let Some(b) = gb.pull().unwrap() {
            batches.push(b.records().to_vec());
        }
        assert_eq!(batches.len(), 2, "one batch per distinct key type");
        let ip_batch = batches
            .iter()
            .find(|b| matches!(b[0].get("key1"), Value::Ip(_)))
            .unwrap();
        let str_batch = batches
            .iter()
            .find(|b| matches!(b[0].get("key1"), Value::String(_)))
            .unwrap();
        assert_eq!(ip_batch.len(), 2);
        assert_eq!(str_batch.len(), 2);
    }

    #[test]
    fn s5_reverse_windowed_streaming_flushes_on_key_change() {
        let ctx = Context::new();
        let tss = [10i64, 8, 7, 6, 2, 1];
        let batch = Batch::new(
            tss.iter()
                .map(|t| rec(vec![("ts", Value::Time(*t * 1_000_000_000))]))
                .collect(),
        );
        let parent = Box::new(Scan::new(ctx.clone(), vec![batch]));
        let mut gb = GroupBy::new(
            parent,
            ctx,
            vec![every_key("ts", "ts", 1_000_000_000)],
            vec![ReducerSpec::new("count", "count", None)],
            true,
        );
        let mut out_ts = Vec::new();
        while let Some(b) = gb.pull().unwrap() {
            assert_eq!(b.len(), 1, "streaming fast path flushes one group at a time");
            let rec = &b.records()[0];
            assert_eq!(rec.get("count"), Value::Int(1));
            if let Value::Time(t) = rec.get("ts") {
                out_ts.push(t / 1_000_000_000);
            }
        }
        assert_eq!(out_ts, vec![10, 8, 7, 6, 2, 1], "preserves reverse input order");
    }

    #[test]
    fn reducers_widen_and_null_per_spec_examples() {
        let ctx = Context::new();
        let batch = Batch::new(vec![
            rec(vec![("key1", Value::String("a".into())), ("n", Value::Int(1))]),
            rec(vec![("key1", Value::String("a".into())), ("n", Value::Int(2))]),
            rec(vec![("key1", Value::String("b".into())), ("n", Value::Int(1))]),
        ]);
        let parent = Box::new(Scan::new(ctx.clone(), vec![batch]));
        let field = |n: &str| Some(crate::expr::field(n));
        let mut gb = GroupBy::new(
            parent,
            ctx,
            vec![key("key1", "key1")],
            vec![
                ReducerSpec::new("first", "first", field("n")),
                ReducerSpec::new("last", "last", field("n")),
                ReducerSpec::new("sum", "sum", field("n")),
                ReducerSpec::new("avg", "avg", field("n")),
                ReducerSpec::new("min", "min", field("n")),
                ReducerSpec::new("max", "max", field("n")),
            ],
            false,
        );
        let out = drain_sorted(&mut gb);
        let a = out.iter().find(|r| r.get("key1") == Value::String("a".into())).unwrap();
        assert_eq!(a.get("first"), Value::Int(1));
        assert_eq!(a.get("last"), Value::Int(2));
        assert_eq!(a.get("sum"), Value::Int(3));
        assert_eq!(a.get("avg"), Value::Float(1.5));
        assert_eq!(a.get("min"), Value::Int(1));
        assert_eq!(a.get("max"), Value::Int(2));
    }

    #[test]
    fn nested_key_with_unset_parent_still_forms_a_group() {
        let ctx = Context::new();
        let with_foo = rec(vec![(
            "foo",
            Value::Record(vec![("a".into(), Value::String("aaa".into()))]),
        )]);
        let without_foo = rec(vec![("foo", Value::Unset)]);
        let batch = Batch::new(vec![with_foo, without_foo]);
        let parent = Box::new(Scan::new(ctx.clone(), vec![batch]));
        let mut gb = GroupBy::new(
            parent,
            ctx,
            vec![key("foo", "foo.a")],
            vec![ReducerSpec::new("count", "count", None)],
            false,
        );
        let out = drain_sorted(&mut gb);
        assert_eq!(out.len(), 2, "the unset-parent record still forms a group, it is not dropped");
    }
}
