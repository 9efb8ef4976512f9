//! Per-space operation guard (spec §4.8). Grounded on
//! `examples/original_source/zqd/space/space.go`'s `opGuard`: a mutex
//! protecting a delete-pending flag and an in-flight counter, with a
//! cancel signal broadcast to every outstanding operation when deletion
//! is requested.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};
use zq_core::{Error, Result};

struct State {
    delete_pending: bool,
    inflight: u64,
}

/// Gates concurrent operations against space deletion.
///
/// A successful [`SpaceGuard::acquire`] strictly happens-before its
/// handle's release (drop); [`SpaceGuard::acquire_for_delete`] strictly
/// happens-after every release that was in flight when it was called.
pub struct SpaceGuard {
    state: Mutex<State>,
    cancel: broadcast::Sender<()>,
    drained: Notify,
}

impl SpaceGuard {
    pub fn new() -> Self {
        let (cancel, _) = broadcast::channel(1);
        SpaceGuard {
            state: Mutex::new(State {
                delete_pending: false,
                inflight: 0,
            }),
            cancel,
            drained: Notify::new(),
        }
    }

    /// Acquire a slot for one in-flight operation. Fails `Conflict` if
    /// the space is pending deletion.
    ///
    /// Takes `self` by `Arc` rather than by reference so the returned
    /// handle owns its keep-alive and can be moved into a spawned task
    /// (a cancellation watcher, say) rather than staying pinned to the
    /// caller's stack frame.
    pub fn acquire(self: &Arc<Self>) -> Result<GuardHandle> {
        let mut state = self.state.lock();
        if state.delete_pending {
            return Err(Error::conflict("space is pending deletion"));
        }
        state.inflight += 1;
        Ok(GuardHandle {
            guard: self.clone(),
            cancel_rx: self.cancel.subscribe(),
            released: false,
        })
    }

    /// Mark the space pending deletion, wake every outstanding
    /// operation via the cancel broadcast, then wait for all of them to
    /// release. Fails `Conflict` if already pending.
    pub async fn acquire_for_delete(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.delete_pending {
                return Err(Error::conflict("space deletion already in progress"));
            }
            state.delete_pending = true;
            let _ = self.cancel.send(());
            if state.inflight == 0 {
                return Ok(());
            }
        }
        loop {
            let notified = self.drained.notified();
            if self.state.lock().inflight == 0 {
                return Ok(());
            }
            notified.await;
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.inflight -= 1;
        if state.inflight == 0 {
            self.drained.notify_waiters();
        }
    }
}

impl Default for SpaceGuard {
    fn default() -> Self {
        SpaceGuard::new()
    }
}

/// A held operation slot. Dropping it releases the slot; holders that
/// need to observe cancellation should `select!` on [`GuardHandle::cancelled`].
pub struct GuardHandle {
    guard: Arc<SpaceGuard>,
    cancel_rx: broadcast::Receiver<()>,
    released: bool,
}

impl GuardHandle {
    /// Resolves once the guard's owning space has begun deletion.
    pub async fn cancelled(&mut self) {
        let _ = self.cancel_rx.recv().await;
    }

    /// Release the slot early, equivalent to dropping the handle.
    pub fn release(mut self) {
        self.do_release();
    }

    fn do_release(&mut self) {
        if !self.released {
            self.released = true;
            self.guard.release();
        }
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.do_release();
    }
}
