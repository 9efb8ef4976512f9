//! The `Head(n)` operator (spec §4.4): yield at most `n` records total,
//! then end-of-stream forever, regardless of how the upstream batches
//! are shaped relative to `n`.

use crate::processor::Processor;
use zq_core::{Batch, Result};

pub struct Head {
    parent: Box<dyn Processor>,
    remaining: usize,
}

impl Head {
    pub fn new(parent: Box<dyn Processor>, limit: usize) -> Self {
        Head {
            parent,
            remaining: limit,
        }
    }
}

impl Processor for Head {
    fn pull(&mut self) -> Result<Option<Batch>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        match self.parent.pull()? {
            Some(batch) => {
                if batch.len() <= self.remaining {
                    self.remaining -= batch.len();
                    Ok(Some(batch))
                } else {
                    let taken: Vec<_> = batch.records()[..self.remaining].to_vec();
                    self.remaining = 0;
                    let _ = batch.release();
                    Ok(Some(Batch::new(taken)))
                }
            }
            None => {
                self.remaining = 0;
                Ok(None)
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
    use zq_core::{Record, TypeId, Value};

    fn rec(n: i64) -> Record {
        Record::new(TypeId(0), vec![("n".into(), Value::Int(n))])
    }

    #[test]
    fn truncates_a_batch_that_exceeds_the_limit() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(
            ctx,
            vec![Batch::new(vec![rec(1), rec(2), rec(3)])],
        ));
        let mut head = Head::new(parent, 2);
        let out = head.pull().unwrap().unwrap();
        assert_eq!(out.len(), 2);
        assert!(head.pull().unwrap().is_none());
    }

    #[test]
    fn stops_after_limit_reached_across_batches() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(
            ctx,
            vec![Batch::new(vec![rec(1)]), Batch::new(vec![rec(2), rec(3)])],
        ));
        let mut head = Head::new(parent, 2);
        assert_eq!(head.pull().unwrap().unwrap().len(), 1);
        assert_eq!(head.pull().unwrap().unwrap().len(), 1);
        assert!(head.pull().unwrap().is_none());
    }

    #[test]
    fn zero_limit_yields_immediate_eos() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(ctx, vec![Batch::new(vec![rec(1)])]));
        let mut head = Head::new(parent, 0);
        assert!(head.pull().unwrap().is_none());
    }

    #[test]
    fn fewer_upstream_records_than_limit_passes_through_untruncated() {
        let ctx = Context::new();
        let parent = Box::new(Scan::new(ctx, vec![Batch::new(vec![rec(1)])]));
        let mut head = Head::new(parent, 5);
        assert_eq!(head.pull().unwrap().unwrap().len(), 1);
        assert!(head.pull().unwrap().is_none());
    }
}
