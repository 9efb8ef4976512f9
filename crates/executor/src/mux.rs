//! Fan-in over N leaf processors, one OS thread per leaf (spec §4.4,
//! §4.5 "Multiplexer"). Grounded on
//! `examples/original_source/driver/mux.go`: every leaf thread pushes
//! onto one shared, bounded data channel; `Multiplexer::poll` races
//! that channel against the query's warning sideband and an optional
//! timeout, exactly the three-way `select` `MuxOutput.Pull` does.
//!
//! The bounded channel is load-bearing, not incidental: a leaf thread
//! blocks on `send` until the consumer drains, so the whole fan-in runs
//! at the rate of the slowest downstream consumer rather than buffering
//! unboundedly ahead of it (the same flow-control argument the Go
//! comment on `Mux.run` makes).

use crate::processor::{Context, Processor};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use zq_core::{Batch, Error, Result};

enum DataMsg {
    Batch { id: usize, batch: Batch },
    Eos { id: usize },
    Error { id: usize, error: Error },
}

/// One event surfaced by [`Multiplexer::poll`].
pub enum MuxEvent {
    Batch { id: usize, batch: Batch },
    Eos { id: usize },
    Error { id: usize, error: Error },
    Warning(String),
    Timeout,
    /// Every leaf has reached EOS or errored and no warnings remain.
    Done,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "leaf processor panicked".to_string()
    }
}

pub struct Multiplexer {
    ctx: Arc<Context>,
    running: usize,
    data_tx: Sender<DataMsg>,
    data_rx: Receiver<DataMsg>,
    warning_rx: Receiver<String>,
    leaves: Vec<Box<dyn Processor>>,
    handles: Vec<JoinHandle<()>>,
    started: bool,
}

impl Multiplexer {
    /// `leaves` must already share `ctx` (each leaf was built against
    /// the same `Arc<Context>`), so a single `Context::cancel()` reaches
    /// every thread this spawns.
    pub fn new(ctx: Arc<Context>, leaves: Vec<Box<dyn Processor>>) -> Self {
        let n = leaves.len().max(1);
        let (data_tx, data_rx) = bounded(n);
        let (warning_tx, warning_rx) = unbounded();
        ctx.set_warning_sink(warning_tx);
        Multiplexer {
            running: leaves.len(),
            ctx,
            data_tx,
            data_rx,
            warning_rx,
            leaves,
            handles: Vec::new(),
            started: false,
        }
    }

    /// Number of leaves this multiplexer fans in over.
    pub fn width(&self) -> usize {
        self.handles.len().max(self.leaves.len())
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for (id, leaf) in std::mem::take(&mut self.leaves).into_iter().enumerate() {
            let tx = self.data_tx.clone();
            let handle = std::thread::spawn(move || {
                let mut leaf = leaf;
                loop {
                    match catch_unwind(AssertUnwindSafe(|| leaf.pull())) {
                        Ok(Ok(Some(batch))) => {
                            if tx.send(DataMsg::Batch { id, batch }).is_err() {
                                return;
                            }
                        }
                        Ok(Ok(None)) => {
                            let _ = tx.send(DataMsg::Eos { id });
                            return;
                        }
                        Ok(Err(error)) => {
                            let _ = tx.send(DataMsg::Error { id, error });
                            return;
                        }
                        Err(panic) => {
                            let _ = tx.send(DataMsg::Error {
                                id,
                                error: Error::internal(panic_message(panic.as_ref())),
                            });
                            return;
                        }
                    }
                }
            });
            self.handles.push(handle);
        }
    }

    /// True once every leaf is done and no warning remains unconsumed
    /// (spec §4.5 "Complete").
    pub fn complete(&self) -> bool {
        self.running == 0 && !self.ctx.has_warnings() && self.warning_rx.is_empty()
    }

    /// Pull one event, racing leaf output against warnings and an
    /// optional timeout.
    pub fn poll(&mut self, timeout: Option<Duration>) -> MuxEvent {
        self.start();
        if self.complete() {
            return MuxEvent::Done;
        }
        let msg = match timeout {
            Some(d) => select! {
                recv(self.data_rx) -> msg => msg.ok(),
                recv(self.warning_rx) -> msg => match msg {
                    Ok(w) => return MuxEvent::Warning(w),
                    Err(_) => None,
                },
                default(d) => return MuxEvent::Timeout,
            },
            None => select! {
                recv(self.data_rx) -> msg => msg.ok(),
                recv(self.warning_rx) -> msg => match msg {
                    Ok(w) => return MuxEvent::Warning(w),
                    Err(_) => None,
                },
            },
        };
        match msg {
            Some(DataMsg::Batch { id, batch }) => MuxEvent::Batch { id, batch },
            Some(DataMsg::Eos { id }) => {
                self.running -= 1;
                MuxEvent::Eos { id }
            }
            Some(DataMsg::Error { id, error }) => {
                self.running -= 1;
                MuxEvent::Error { id, error }
            }
            None => MuxEvent::Done,
        }
    }

    /// Drain every remaining event, discarding them — used to unwind a
    /// cancelled query (spec §5 "Cancellation").
    pub fn drain(&mut self) {
        while !self.complete() {
            self.poll(None);
        }
    }

    pub fn records_scanned(&self) -> u64 {
        self.ctx.records_scanned()
    }
}

impl Processor for Multiplexer {
    fn pull(&mut self) -> Result<Option<Batch>> {
        loop {
            match self.poll(None) {
                MuxEvent::Batch { batch, .. } => return Ok(Some(batch)),
                MuxEvent::Eos { .. } => continue,
                MuxEvent::Error { error, .. } => return Err(error),
                MuxEvent::Warning(w) => {
                    self.ctx.push_warning_direct(w);
                    continue;
                }
                // poll(None) never produces Timeout.
                MuxEvent::Timeout => continue,
                MuxEvent::Done => return Ok(None),
            }
        }
    }

    fn done(&mut self) {
        self.ctx.cancel();
        self.drain();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
