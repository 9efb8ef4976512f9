//! The `Filter` operator (spec §4.4).

use crate::expr::Predicate;
use crate::processor::Processor;
use zq_core::{Batch, Record, Result};

pub struct Filter {
    parent: Box<dyn Processor>,
    predicate: Predicate,
}

impl Filter {
    pub fn new(parent: Box<dyn Processor>, predicate: Predicate) -> Self {
        Filter { parent, predicate }
    }
}

impl Processor for Filter {
    fn pull(&mut self) -> Result<Option<Batch>> {
        loop {
            let Some(batch) = self.parent.pull()? else {
                return Ok(None);
            };
            if batch.is_empty() {
                // Empty input batches pass through as an EOS-check
                // trigger only, not as data (spec §4.4).
                let _ = batch.release();
                continue;
            }
            let kept: Vec<Record> = batch
                .records()
                .iter()
                .filter(|record| (self.predicate)(record))
                .cloned()
                .collect();
            let _ = batch.release();
            if kept.is_empty() {
                // An empty resulting batch is swallowed; pull again.
                continue;
            }
            return Ok(Some(Batch::new(kept)));
        }
    }

    fn done(&mut self) {
        self.parent.done();
    }
}
