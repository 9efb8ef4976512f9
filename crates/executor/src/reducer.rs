//! Group-by reducers (spec §4.7 "Reducers").
//!
//! Each reducer is a small `consume`/`result` state machine. Grounded
//! on `examples/original_source/proc/groupby_test.go`'s table of
//! reducer edge cases: `count()` of nothing is `0`, never null;
//! `sum`/`avg`/`min`/`max` of nothing (or all-unset input) is null;
//! `first`/`last` only look at non-null inputs; numeric reducers widen
//! int64 to float64 conservatively on encountering a float and ignore
//! non-numeric input silently rather than erroring (spec §4.7).

use zq_core::{Number, Value};

/// One named reducer instance accumulating state for a single group.
pub trait Reducer: Send {
    /// Feed one input value. `Value::Unset` inputs are handled
    /// per-reducer (e.g. `count` still counts them; `sum` ignores
    /// them).
    fn consume(&mut self, value: &Value);

    /// The reducer's current result. Called once per group at flush
    /// time; reducers are not required to support calling this
    /// mid-stream.
    fn result(&self) -> Value;

    /// Reset to the empty state, for the streaming-sorted fast path
    /// where one `Reducer` instance is reused across groups.
    fn reset(&mut self);
}

/// Construct a fresh reducer instance by name. Unknown names are a
/// compiler-time error upstream (the AST compiler validates reducer
/// names); this returns `None` so tests and callers can assert that.
pub fn make(name: &str) -> Option<Box<dyn Reducer>> {
    match name {
        "count" => Some(Box::new(Count::default())),
        "first" => Some(Box::new(First::default())),
        "last" => Some(Box::new(Last::default())),
        "sum" => Some(Box::new(Sum::default())),
        "avg" => Some(Box::new(Avg::default())),
        "min" => Some(Box::new(MinMax::new(true))),
        "max" => Some(Box::new(MinMax::new(false))),
        "union" => Some(Box::new(Union::default())),
        "collect" => Some(Box::new(Collect::default())),
        _ => None,
    }
}

/// `count()`: number of records observed, including those with an
/// unset input. Zero inputs yields `0`, never null (spec §4.7).
#[derive(Default)]
pub struct Count {
    n: u64,
}

impl Reducer for Count {
    fn consume(&mut self, _value: &Value) {
        self.n += 1;
    }
    fn result(&self) -> Value {
        Value::Int(self.n as i64)
    }
    fn reset(&mut self) {
        self.n = 0;
    }
}

/// `first()`: the first non-null value observed.
#[derive(Default)]
pub struct First {
    value: Option<Value>,
}

impl Reducer for First {
    fn consume(&mut self, value: &Value) {
        if self.value.is_none() && !value.is_unset() {
            self.value = Some(value.clone());
        }
    }
    fn result(&self) -> Value {
        self.value.clone().unwrap_or(Value::Unset)
    }
    fn reset(&mut self) {
        self.value = None;
    }
}

/// `last()`: overwritten by every non-null value observed.
#[derive(Default)]
pub struct Last {
    value: Option<Value>,
}

impl Reducer for Last {
    fn consume(&mut self, value: &Value) {
        if !value.is_unset() {
            self.value = Some(value.clone());
        }
    }
    fn result(&self) -> Value {
        self.value.clone().unwrap_or(Value::Unset)
    }
    fn reset(&mut self) {
        self.value = None;
    }
}

/// `sum()`: conservative int->float widening, ignores non-numeric and
/// unset input, null if nothing valid was seen (spec §4.7).
#[derive(Default)]
pub struct Sum {
    total: Option<Number>,
}

impl Reducer for Sum {
    fn consume(&mut self, value: &Value) {
        let Some(n) = value.as_number() else {
            return;
        };
        self.total = Some(match self.total {
            Some(t) => t.add(n),
            None => n,
        });
    }
    fn result(&self) -> Value {
        self.total.map(Number::into_value).unwrap_or(Value::Unset)
    }
    fn reset(&mut self) {
        self.total = None;
    }
}

/// `avg()`: tracks count and sum separately, always emits `float64`
/// (spec §4.7); null if no valid input was seen.
#[derive(Default)]
pub struct Avg {
    sum: f64,
    count: u64,
}

impl Reducer for Avg {
    fn consume(&mut self, value: &Value) {
        if let Some(n) = value.as_number() {
            self.sum += n.as_f64();
            self.count += 1;
        }
    }
    fn result(&self) -> Value {
        if self.count == 0 {
            Value::Unset
        } else {
            Value::Float(self.sum / self.count as f64)
        }
    }
    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

/// `min()`/`max()`: same non-numeric/unset handling as `sum`.
pub struct MinMax {
    want_min: bool,
    best: Option<Number>,
}

impl MinMax {
    pub fn new(want_min: bool) -> Self {
        MinMax {
            want_min,
            best: None,
        }
    }
}

impl Reducer for MinMax {
    fn consume(&mut self, value: &Value) {
        let Some(n) = value.as_number() else {
            return;
        };
        self.best = Some(match self.best {
            None => n,
            Some(cur) => {
                let better = if self.want_min {
                    n.partial_cmp(&cur) == Some(std::cmp::Ordering::Less)
                } else {
                    n.partial_cmp(&cur) == Some(std::cmp::Ordering::Greater)
                };
                if better {
                    n
                } else {
                    cur
                }
            }
        });
    }
    fn result(&self) -> Value {
        self.best.map(Number::into_value).unwrap_or(Value::Unset)
    }
    fn reset(&mut self) {
        self.best = None;
    }
}

/// `union()`: the set of distinct non-null values observed, order of
/// first appearance.
#[derive(Default)]
pub struct Union {
    seen: Vec<Value>,
}

impl Reducer for Union {
    fn consume(&mut self, value: &Value) {
        if value.is_unset() {
            return;
        }
        if !self.seen.contains(value) {
            self.seen.push(value.clone());
        }
    }
    fn result(&self) -> Value {
        Value::Array(self.seen.clone())
    }
    fn reset(&mut self) {
        self.seen.clear();
    }
}

/// `collect()`: every non-null value observed, in arrival order
/// (duplicates retained — the distinction from `union`).
#[derive(Default)]
pub struct Collect {
    values: Vec<Value>,
}

impl Reducer for Collect {
    fn consume(&mut self, value: &Value) {
        if !value.is_unset() {
            self.values.push(value.clone());
        }
    }
    fn result(&self) -> Value {
        Value::Array(self.values.clone())
    }
    fn reset(&mut self) {
        self.values.clear();
    }
}
