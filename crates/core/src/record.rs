//! Records and batches (spec §3).
//!
//! A [`Record`] is a typed tuple carrying a stable, per-process
//! [`TypeId`] so aggregators can key by type identity in O(1). Records
//! are immutable once produced; [`Record::keep`] is the explicit
//! deep-copy a caller must perform to retain a record past its batch's
//! release.
//!
//! A [`Batch`] is the unit records move between processors in,
//! reference-counted so a producer can hand ownership downstream
//! without copying (spec §9 "Batch reference counting").

use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A per-process, interned type identity.
///
/// Two records with the same shape (same field names, same order,
/// comparable value types) share a `TypeId`, allowing the group-by
/// aggregator (spec §4.7) to use the id as a hash-table key component
/// instead of comparing shapes structurally on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// A single, immutable typed tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    type_id: TypeId,
    fields: Arc<Vec<(String, Value)>>,
}

impl Record {
    /// Construct a record directly from already-interned fields.
    pub fn new(type_id: TypeId, fields: Vec<(String, Value)>) -> Self {
        Record {
            type_id,
            fields: Arc::new(fields),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    /// Fetch a top-level or dotted-path field, returning
    /// [`Value::Unset`] if absent.
    pub fn get(&self, path: &str) -> Value {
        let mut parts = path.splitn(2, '.');
        let head = parts.next().unwrap_or("");
        let rest = parts.next();
        match self.fields.iter().find(|(name, _)| name == head) {
            None => Value::Unset,
            Some((_, v)) => match rest {
                None => v.clone(),
                Some(path) => v.lookup_path(path),
            },
        }
    }

    /// Deep-copy this record so it can outlive its owning batch's
    /// release, as required by spec §3 ("retaining a record past a
    /// batch's release requires an explicit deep-copy").
    pub fn keep(&self) -> Record {
        Record {
            type_id: self.type_id,
            fields: Arc::new((*self.fields).clone()),
        }
    }
}

/// Interns record shapes into stable [`TypeId`]s.
///
/// One `TypeTable` is shared across a query's processor tree (analogous
/// to the upstream `zng.Context`), so that two records produced by
/// different leaves but sharing a shape compare equal by id.
#[derive(Debug, Default)]
pub struct TypeTable {
    shapes: Vec<Vec<(String, crate::value::TypeTag)>>,
}

impl TypeTable {
    pub fn new() -> Self {
        TypeTable::default()
    }

    /// Intern a shape, returning its existing id if already seen.
    pub fn intern(&mut self, shape: Vec<(String, crate::value::TypeTag)>) -> TypeId {
        if let Some(pos) = self.shapes.iter().position(|s| s == &shape) {
            return TypeId(pos as u32);
        }
        self.shapes.push(shape);
        TypeId((self.shapes.len() - 1) as u32)
    }

    /// Compute and intern the shape of a field list, returning the
    /// resulting record's `TypeId`.
    pub fn type_of(&mut self, fields: &[(String, Value)]) -> TypeId {
        let shape = fields
            .iter()
            .map(|(name, v)| (name.clone(), v.type_tag()))
            .collect();
        self.intern(shape)
    }
}

/// Internal, shared storage for a batch's records plus a live-reference
/// counter.
#[derive(Debug)]
struct BatchInner {
    records: Vec<Record>,
    refcount: AtomicUsize,
}

/// An ordered, reference-counted sequence of records handed between
/// processors (spec §3 "Batch").
///
/// `Batch::new` creates with an implicit refcount of 1, representing
/// the producer's own handle. Additional consumers call
/// [`Batch::retain`]; every holder calls [`Batch::release`] exactly
/// once. When the count reaches zero the backing [`Vec`] is dropped and
/// may be reused by an arena (not modeled here — we rely on the
/// allocator).
#[derive(Debug, Clone)]
pub struct Batch {
    inner: Arc<BatchInner>,
}

impl Batch {
    /// Target batch length used by scanners/operators to keep pipelines
    /// responsive (spec §3: "target hundreds of records").
    pub const TARGET_LEN: usize = 512;

    /// Create a new batch owning `records`, with an initial refcount of
    /// one (the producer's handle).
    pub fn new(records: Vec<Record>) -> Self {
        Batch {
            inner: Arc::new(BatchInner {
                records,
                refcount: AtomicUsize::new(1),
            }),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.inner.records
    }

    pub fn len(&self) -> usize {
        self.inner.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.is_empty()
    }

    /// Register an additional reference to this batch, e.g. when a
    /// fan-out operator hands the same batch to more than one
    /// downstream consumer.
    pub fn retain(&self) -> Self {
        self.inner.refcount.fetch_add(1, Ordering::AcqRel);
        Batch {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Release this handle. Returns `true` if this was the last live
    /// reference (the batch's backing storage is now reclaimable).
    pub fn release(self) -> bool {
        self.inner.refcount.fetch_sub(1, Ordering::AcqRel) == 1
    }

    /// Current live-reference count, for tests and diagnostics.
    pub fn refcount(&self) -> usize {
        self.inner.refcount.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(fields: Vec<(&str, Value)>) -> Record {
        Record::new(
            TypeId(0),
            fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )
    }

    #[test]
    fn get_resolves_dotted_path() {
        let r = rec(vec![(
            "a",
            Value::Record(vec![("b".into(), Value::Int(42))]),
        )]);
        assert_eq!(r.get("a.b"), Value::Int(42));
    }

    #[test]
    fn get_missing_field_is_unset() {
        let r = rec(vec![("a", Value::Int(1))]);
        assert_eq!(r.get("missing"), Value::Unset);
    }

    #[test]
    fn keep_produces_independent_copy() {
        let r = rec(vec![("a", Value::Int(1))]);
        let kept = r.keep();
        assert_eq!(r, kept);
    }

    #[test]
    fn type_table_interns_identical_shapes_to_same_id() {
        let mut table = TypeTable::new();
        let a = rec(vec![("x", Value::Int(1))]);
        let b = rec(vec![("x", Value::Int(2))]);
        let id_a = table.type_of(a.fields());
        let id_b = table.type_of(b.fields());
        assert_eq!(id_a, id_b);
    }

    #[test]
    fn type_table_distinguishes_different_shapes() {
        let mut table = TypeTable::new();
        let a = rec(vec![("x", Value::Int(1))]);
        let b = rec(vec![("x", Value::String("s".into()))]);
        assert_ne!(table.type_of(a.fields()), table.type_of(b.fields()));
    }

    #[test]
    fn batch_release_reports_last_reference() {
        let b = Batch::new(vec![]);
        let b2 = b.retain();
        assert_eq!(b.refcount(), 2);
        assert!(!b.release());
        assert!(b2.release());
    }

    #[test]
    fn batch_accounting_matched_release() {
        // Property from spec §8: for every batch produced, a matched
        // release occurs before EOS is reported. We model "produced"
        // as refcount starting at 1 and check it reaches 0 after as
        // many releases as retains + 1.
        let b = Batch::new(vec![rec(vec![("n", Value::Int(1))])]);
        let clones: Vec<_> = (0..3).map(|_| b.retain()).collect();
        assert_eq!(b.refcount(), 4);
        let mut last = false;
        for c in clones {
            last = c.release();
        }
        assert!(!last, "clones are not the final release");
        assert!(b.release());
    }
}
