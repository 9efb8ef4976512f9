//! Search orchestration (spec §4.6): resolve a space, build one scan
//! leaf per overlapping archive chunk, multiplex them, compile the
//! client's `proc` program on top, and drive the NDJSON control-frame
//! protocol (spec §6) to completion.
//!
//! Grounded on `examples/original_source/zqd/handlers.go`'s
//! `handleSearch`: acquire the space's operation guard before touching
//! storage and release it on every exit path, and on the streaming
//! loop `examples/original_source/zqd/api/api.go` describes — records,
//! then warnings, then a stats update, per batch.
//!
//! Once the guard is held, a watcher task awaits
//! [`zq_concurrency::GuardHandle::cancelled`] and calls [`Context::cancel`]
//! when it resolves (spec §4.8: a pending delete must reach a running
//! search, not just block behind it), mirroring the `select!` pattern
//! `zq_concurrency::guard`'s own tests use. Outside a tokio runtime (the
//! synchronous unit tests in this module) there is nowhere to spawn
//! that task, so the guard is simply held and released the old way.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::oneshot;
use zq_concurrency::GuardHandle;
use zq_core::{Error, Result, TypeTable};
use zq_executor::{compile_program, parse, Context, Processor};
use zq_wire::protocol::{
    ApiError, SearchEnd, SearchRecords, SearchRequest, SearchStats, SearchWarning, TaskEnd,
    TaskStart,
};
use zq_wire::record_json::record_to_json;

use crate::space;
use crate::space_registry::SpaceRegistry;
use crate::store;

/// Where the search's operation-guard slot lives once everything
/// fallible up front has succeeded and the actual scan is about to run.
enum GuardKeeper {
    /// A watcher task owns the handle; `cancelled()` there drives
    /// `Context::cancel`, and dropping the sender tells it to stop
    /// watching and release the slot.
    Watched(oneshot::Sender<()>),
    /// No tokio runtime to spawn a watcher on (plain synchronous
    /// callers); the slot is just held until dropped.
    Held(GuardHandle),
}

impl GuardKeeper {
    fn new(mut handle: GuardHandle, ctx: Arc<Context>) -> GuardKeeper {
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let (done_tx, done_rx) = oneshot::channel::<()>();
                rt.spawn(async move {
                    tokio::select! {
                        _ = handle.cancelled() => ctx.cancel(),
                        _ = done_rx => {}
                    }
                });
                GuardKeeper::Watched(done_tx)
            }
            Err(_) => GuardKeeper::Held(handle),
        }
    }

    /// Release the slot: signal the watcher to stop, or drop the handle
    /// directly if there was no watcher.
    fn release(self) {
        match self {
            GuardKeeper::Watched(done_tx) => {
                let _ = done_tx.send(());
            }
            GuardKeeper::Held(handle) => drop(handle),
        }
    }
}

static NEXT_TASK_ID: AtomicI64 = AtomicI64::new(1);

/// One line of the streaming response (spec §6: one JSON object per
/// line, discriminated by `type`).
pub type Frame = serde_json::Value;

fn now_unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Run a search to completion, invoking `emit` for every frame in
/// protocol order: `TaskStart`, then an interleaving of
/// `SearchRecords`/`SearchWarning`/`SearchStats` per batch, then
/// `SearchEnd`, then `TaskEnd` (spec §6).
///
/// `emit` returning `Err` is treated as a client disconnect (spec §7):
/// the loop exits quietly without attempting to send a trailing
/// `TaskEnd`, since there is nowhere left to send one.
pub fn run_search(
    registry: &SpaceRegistry,
    request: SearchRequest,
    mut emit: impl FnMut(Frame) -> std::io::Result<()>,
) -> Result<()> {
    let task_id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
    if emit(frame(TaskStart { task_id })).is_err() {
        return Ok(());
    }

    let result = run_search_inner(registry, &request, &mut emit);

    let end = TaskEnd {
        task_id,
        error: result.as_ref().err().map(ApiError::from),
    };
    let _ = emit(frame(end));
    result
}

fn frame(value: impl serde::Serialize) -> Frame {
    serde_json::to_value(value).expect("protocol frames always serialize")
}

fn run_search_inner(
    registry: &SpaceRegistry,
    request: &SearchRequest,
    emit: &mut impl FnMut(Frame) -> std::io::Result<()>,
) -> Result<()> {
    let config = registry.get(&request.space)?;
    space::check_direction(&config, request.dir.0)?;

    let guard = registry.guards().get_or_create(&config.id);
    // Held for the duration of the search; `SpaceGuard::acquire_for_delete`
    // blocks until this is released, so deletion never races a live
    // search against the storage it reads (spec §4.8).
    let handle = guard.acquire()?;

    let archive = registry.open_archive(&config)?;
    let chunks = archive.span_walk(request.span);

    let ctx = Context::new();
    let types = Arc::new(Mutex::new(TypeTable::new()));
    let source = registry.source();
    let mut leaves: Vec<Box<dyn Processor>> = Vec::with_capacity(chunks.len());
    for (uri, span_info) in &chunks {
        let bounded = request.span.intersect(&span_info.span);
        let scan = store::scanner_for_chunk(
            source.as_ref(),
            uri,
            Some(("ts", bounded)),
            &types,
            ctx.clone(),
        )?;
        leaves.push(Box::new(scan));
    }

    let node = parse(&request.proc)?;
    let mut tree = compile_program(&node, &ctx, leaves)?;

    // Everything fallible is behind us; hand the guard slot to a
    // cancellation watcher before running the scan itself.
    let keeper = GuardKeeper::new(handle, ctx.clone());

    let start_time = now_unix_nanos();
    let mut records_matched: i64 = 0;
    let channel_id = 0;

    let outcome = drive(&mut *tree, &ctx, channel_id, start_time, &mut records_matched, emit);

    tree.done();
    keeper.release();
    outcome
}

fn drive(
    tree: &mut dyn Processor,
    ctx: &Arc<Context>,
    channel_id: i32,
    start_time: i64,
    records_matched: &mut i64,
    emit: &mut impl FnMut(Frame) -> std::io::Result<()>,
) -> Result<()> {
    loop {
        match tree.pull()? {
            Some(batch) => {
                let records: Vec<serde_json::Value> =
                    batch.records().iter().map(record_to_json).collect();
                *records_matched += records.len() as i64;
                let records_read = ctx.records_scanned() as i64;
                let _ = batch.release();

                if emit(frame(SearchRecords { channel_id, records })).is_err() {
                    return Ok(());
                }
                if !drain_warnings(ctx, emit)? {
                    return Ok(());
                }
                let stats = SearchStats {
                    start_time,
                    update_time: now_unix_nanos(),
                    bytes_read: 0,
                    bytes_matched: 0,
                    records_read,
                    records_matched: *records_matched,
                };
                if emit(frame(stats)).is_err() {
                    return Ok(());
                }
            }
            None => {
                if !drain_warnings(ctx, emit)? {
                    return Ok(());
                }
                let _ = emit(frame(SearchEnd {
                    channel_id,
                    reason: "eof".to_string(),
                }));
                return Ok(());
            }
        }
    }
}

/// Returns `false` once `emit` signals a disconnect, so the caller can
/// abandon the rest of the loop rather than keep pulling batches no one
/// will receive.
fn drain_warnings(ctx: &Arc<Context>, emit: &mut impl FnMut(Frame) -> std::io::Result<()>) -> Result<bool> {
    while let Some(warning) = ctx.take_warning() {
        if emit(frame(SearchWarning { warning })).is_err() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Maps a [`zq_core::Error`] to the HTTP status the handler layer uses
/// (spec §6's kind → status table), kept here so search's own failure
/// modes (bad `proc`, unknown space, direction mismatch) are visible
/// next to where they're raised.
pub fn status_for(err: &Error) -> u16 {
    err.status_code()
}
