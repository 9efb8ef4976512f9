//! The pull-based processor interface (spec §4.4) and the query-scoped
//! shared [`Context`] (cancellation plus the warnings sideband, spec §9).

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use zq_core::{Batch, Result};

/// A single-consumer pull source producing batches (spec §4.4).
///
/// `pull` returning `Ok(None)` signals end-of-stream. A fault converts
/// to `Err` rather than unwinding the process, so a malformed record
/// costs one query rather than the server (spec §4.4 "Safety").
pub trait Processor: Send {
    fn pull(&mut self) -> Result<Option<Batch>>;

    /// Release upstream resources. Default no-op; leaf scanners
    /// override to close file handles.
    fn done(&mut self) {}
}

/// State shared by every processor in one query's tree: the
/// cancellation flag and the warnings sideband.
///
/// Spec §9: "Warnings are a sideband, not an error channel... implement
/// as a single shared sink (context-carried) rather than threading
/// through every operator." We also park the scanned-record counter
/// here so [`crate::mux::Multiplexer::stats`] can aggregate across
/// leaves without reaching back into threads it no longer owns.
///
/// Before a [`crate::mux::Multiplexer`] starts its workers it installs
/// a channel sink via [`Context::set_warning_sink`]; `push_warning`
/// then forwards directly onto that channel so the multiplexer can
/// `select!` on warnings and data together (spec §4.5). Without an
/// installed sink (e.g. a processor under test, with no multiplexer
/// above it) warnings fall back to the in-memory queue.
#[derive(Default)]
pub struct Context {
    cancelled: AtomicBool,
    warnings: Mutex<VecDeque<String>>,
    warning_sink: Mutex<Option<crossbeam_channel::Sender<String>>>,
    records_scanned: AtomicU64,
}

impl Context {
    pub fn new() -> Arc<Context> {
        Arc::new(Context::default())
    }

    /// Request cancellation; observed by leaves at their next poll
    /// (spec §5 "Cancellation").
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Push a warning onto the sideband; any component in the tree may
    /// call this (spec §4.5 "fed by any component in the tree via the
    /// shared context").
    pub fn push_warning(&self, message: impl Into<String>) {
        let message = message.into();
        let sink = self.warning_sink.lock();
        match sink.as_ref() {
            // An unbounded channel: a producer deep in the tree must
            // never block on a slow consumer just to report a warning.
            Some(tx) => {
                let _ = tx.send(message);
            }
            None => self.warnings.lock().push_back(message),
        }
    }

    /// Install the channel a [`crate::mux::Multiplexer`] selects
    /// warnings on. Replaces any prior sink.
    pub fn set_warning_sink(&self, sink: crossbeam_channel::Sender<String>) {
        *self.warning_sink.lock() = Some(sink);
    }

    pub fn take_warning(&self) -> Option<String> {
        self.warnings.lock().pop_front()
    }

    /// Push directly onto the fallback queue, bypassing any installed
    /// sink. [`crate::mux::Multiplexer`] uses this to re-surface a
    /// warning it has already drained off its own sink channel — routing
    /// it back through [`Context::push_warning`] would just resend it
    /// into the same channel.
    pub(crate) fn push_warning_direct(&self, message: String) {
        self.warnings.lock().push_back(message);
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.lock().is_empty()
    }

    pub fn record_scanned(&self, n: u64) {
        self.records_scanned.fetch_add(n, Ordering::Relaxed);
    }

    pub fn records_scanned(&self) -> u64 {
        self.records_scanned.load(Ordering::Relaxed)
    }
}
