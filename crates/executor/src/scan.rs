//! A leaf processor over already-decoded batches.
//!
//! Spec §1 scopes the event codec out as an external collaborator, so
//! the concrete storage scanner this stands in for (decoding `.zng`
//! chunks into records) is not implemented here; `Scan` is the seam the
//! search orchestrator and tests feed pre-decoded batches through,
//! playing the role spec §4.4 assigns to "leaves... scanners over
//! storage".

use crate::processor::{Context, Processor};
use std::collections::VecDeque;
use std::sync::Arc;
use zq_core::{Batch, Result};

pub struct Scan {
    ctx: Arc<Context>,
    batches: VecDeque<Batch>,
}

impl Scan {
    pub fn new(ctx: Arc<Context>, batches: impl IntoIterator<Item = Batch>) -> Self {
        Scan {
            ctx,
            batches: batches.into_iter().collect(),
        }
    }
}

impl Processor for Scan {
    fn pull(&mut self) -> Result<Option<Batch>> {
        if self.ctx.is_cancelled() {
            return Err(zq_core::Error::internal("scan cancelled"));
        }
        match self.batches.pop_front() {
            Some(batch) => {
                self.ctx.record_scanned(batch.len() as u64);
                Ok(Some(batch))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::{Record, TypeId, Value};

    fn rec(n: i64) -> Record {
        Record::new(TypeId(0), vec![("n".into(), Value::Int(n))])
    }

    #[test]
    fn yields_batches_then_eos() {
        let ctx = Context::new();
        let mut scan = Scan::new(ctx.clone(), vec![Batch::new(vec![rec(1)]), Batch::new(vec![rec(2)])]);
        assert_eq!(scan.pull().unwrap().unwrap().len(), 1);
        assert_eq!(scan.pull().unwrap().unwrap().len(), 1);
        assert!(scan.pull().unwrap().is_none());
        assert_eq!(ctx.records_scanned(), 2);
    }

    #[test]
    fn cancellation_surfaces_as_error() {
        let ctx = Context::new();
        ctx.cancel();
        let mut scan = Scan::new(ctx, vec![Batch::new(vec![rec(1)])]);
        assert!(scan.pull().is_err());
    }
}
