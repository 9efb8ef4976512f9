//! The identity operator named in spec §4.4's operator list — used as a
//! multiplexer leaf placeholder and in tests where a stage in the tree
//! must exist structurally but do nothing.

use crate::processor::Processor;
use zq_core::{Batch, Result};

pub struct PassThrough {
    parent: Box<dyn Processor>,
}

impl PassThrough {
    pub fn new(parent: Box<dyn Processor>) -> Self {
        PassThrough { parent }
    }
}

impl Processor for PassThrough {
    fn pull(&mut self) -> Result<Option<Batch>> {
        self.parent.pull()
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

    #[test]
    fn forwards_batches_and_eos_unchanged() {
        let ctx = Context::new();
        let rec = Record::new(TypeId(0), vec![("n".into(), Value::Int(1))]);
        let parent = Box::new(Scan::new(ctx, vec![Batch::new(vec![rec])]));
        let mut pt = PassThrough::new(parent);
        assert_eq!(pt.pull().unwrap().unwrap().len(), 1);
        assert!(pt.pull().unwrap().is_none());
    }
}
