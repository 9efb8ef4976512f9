//! The `Tail(n)` operator (spec §4.4): emit the last `n` records seen,
//! in original order, as one batch at end-of-stream.
//!
//! Grounded on `examples/original_source/proc/tail.go`'s ring buffer,
//! with one fix: the original always emits a `limit`-length array,
//! including unwritten `nil` slots when fewer than `limit` records were
//! ever seen (`out := make([]*zson.Record, t.limit)` copies every slot
//! unconditionally). We emit exactly `count` records instead.

use crate::processor::Processor;
use zq_core::{Batch, Record, Result};

pub struct Tail {
    parent: Box<dyn Processor>,
    limit: usize,
    ring: Vec<Option<Record>>,
    off: usize,
    count: usize,
    done: bool,
}

impl Tail {
    pub fn new(parent: Box<dyn Processor>, limit: usize) -> Self {
        Tail {
            parent,
            limit: limit.max(1),
            ring: vec![None; limit.max(1)],
            off: 0,
            count: 0,
            done: false,
        }
    }

    fn flush(&mut self) -> Option<Batch> {
        if self.count == 0 {
            return None;
        }
        let mut out = Vec::with_capacity(self.count);
        // The oldest retained record sits `count` slots behind the next
        // write position, wrapping through the ring.
        let start = (self.off + self.limit - self.count) % self.limit;
        for k in 0..self.count {
            let idx = (start + k) % self.limit;
            out.push(self.ring[idx].clone().expect("slot within count is populated"));
        }
        Some(Batch::new(out))
    }
}

impl Processor for Tail {
    fn pull(&mut self) -> Result<Option<Batch>> {
        if self.done {
            return Ok(None);
        }
        loop {
            match self.parent.pull()? {
                Some(batch) => {
                    for record in batch.records() {
                        self.ring[self.off] = Some(record.keep());
                        self.off = (self.off + 1) % self.limit;
                        self.count = (self.count + 1).min(self.limit);
                    }
                    let _ = batch.release();
                }
                None => {
                    self.done = true;
                    return Ok(self.flush());
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
    use crate::processor::Context;
    use crate::scan::Scan;
    use zq_core::{TypeId, Value};

    fn rec(ts: i64) -> Record {
        Record::new(TypeId(0), vec![("ts".into(), Value::Time(ts))])
    }

    #[test]
    fn s4_tail_two_of_five_keeps_last_two_in_order() {
        // spec §8 S4: ts=1..5, tail 2 -> (4),(5).
        let ctx = Context::new();
        let parent = Box::new(Scan::new(
            ctx,
            vec![Batch::new(vec![rec(1), rec(2), rec(3), rec(4), rec(5)])],
        ));
        let mut tail = Tail::new(parent, 2);
        let out = tail.pull().unwrap().unwrap();
        let ts: Vec<_> = out.records().iter().map(|r| r.get("ts")).collect();
        assert_eq!(ts, vec![Value::Time(4), Value::Time(5)]);
        assert!(tail.pull().unwrap().is_none());
    }

    #[test]
    fn fewer_records_than_limit_emits_only_what_was_seen() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(ctx, vec![Batch::new(vec![rec(1), rec(2)])]));
        let mut tail = Tail::new(parent, 5);
        let out = tail.pull().unwrap().unwrap();
        assert_eq!(out.len(), 2);
        let ts: Vec<_> = out.records().iter().map(|r| r.get("ts")).collect();
        assert_eq!(ts, vec![Value::Time(1), Value::Time(2)]);
    }

    #[test]
    fn zero_records_seen_yields_eos_with_no_batch() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(ctx, vec![]));
        let mut tail = Tail::new(parent, 3);
        assert!(tail.pull().unwrap().is_none());
    }

    #[test]
    fn wraps_correctly_across_multiple_batches() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(
            ctx,
            vec![
                Batch::new(vec![rec(1), rec(2), rec(3)]),
                Batch::new(vec![rec(4), rec(5)]),
            ],
        ));
        let mut tail = Tail::new(parent, 3);
        let out = tail.pull().unwrap().unwrap();
        let ts: Vec<_> = out.records().iter().map(|r| r.get("ts")).collect();
        assert_eq!(ts, vec![Value::Time(3), Value::Time(4), Value::Time(5)]);
    }
}
