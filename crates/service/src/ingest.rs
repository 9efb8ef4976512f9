//! Log ingest (`POST /log/{space}`, spec §4.2 "append", §6). Grounded on
//! `examples/original_source/zqd/handlers.go`'s `handleLogPost` for the
//! guard-then-append shape, with decoding delegated to [`crate::store`].
//!
//! The paths in a [`LogPostRequest`] name files the server can already
//! read through its [`Source`] — matching how `zqd` ingests logs
//! already staged on the server's filesystem rather than accepting
//! raw upload bytes over the wire (spec §1 treats the upload transport
//! itself as out of scope).

use parking_lot::Mutex;
use std::sync::Arc;
use zq_archive::SpanInfo;
use zq_core::{ChunkId, Result, SpaceId, Span, TypeTable};
use zq_storage::Uri;
use zq_wire::protocol::{LogPostRequest, LogPostStatus, LogPostWarning};

use crate::space_registry::SpaceRegistry;
use crate::store;

pub type Frame = serde_json::Value;

fn frame(value: impl serde::Serialize) -> Frame {
    serde_json::to_value(value).expect("protocol frames always serialize")
}

/// Ingest every path in `request` into one new chunk per path, append
/// it to the space's archive, and widen the cached span/size (spec
/// §3 "Lifecycles": a space's metadata is rewritten as data is
/// appended).
pub fn ingest_log(
    registry: &SpaceRegistry,
    id: &SpaceId,
    request: LogPostRequest,
    mut emit: impl FnMut(Frame) -> std::io::Result<()>,
) -> Result<()> {
    let config = registry.get(id)?;
    let guard = registry.guards().get_or_create(&config.id);
    let handle = guard.acquire()?;

    let result = (|| -> Result<()> {
        let mut archive = registry.open_archive(&config)?;
        let mut cache = registry.info_cache(&config)?;
        let source = registry.source();
        let types = Arc::new(Mutex::new(TypeTable::new()));
        let ctx = zq_executor::Context::new();

        for path in &request.paths {
            let source_uri = Uri::parse(path);
            let bytes = zq_storage::read_all(source.as_ref(), &source_uri)?;
            let total_size = bytes.len() as i64;

            let records = store::read_chunk(source.as_ref(), &source_uri, None, &types, &ctx)?;
            while let Some(warning) = ctx.take_warning() {
                let _ = emit(frame(LogPostWarning { warning }));
            }

            let span = span_of(&records);
            let chunk_id = ChunkId::generate();
            let chunk_uri = archive.localize(&chunk_id);
            zq_storage::write_all(source.as_ref(), &chunk_uri, &bytes)?;
            archive.append(vec![SpanInfo { span: span.unwrap_or(Span::new(0, 0)), chunk_id }])?;

            cache.merge(span, total_size);

            if emit(frame(LogPostStatus {
                log_total_size: total_size,
                log_read_size: total_size,
            }))
            .is_err()
            {
                break;
            }
        }

        cache.write(source.as_ref(), &config.root())?;
        Ok(())
    })();

    drop(handle);
    result
}

/// The union span of a batch of newly ingested records' `ts` fields,
/// or `None` if none carry one (spec §4.2: a chunk's span comes from
/// its own record timestamps, not a caller-supplied hint).
fn span_of(records: &[zq_core::Record]) -> Option<Span> {
    records.iter().fold(None, |acc, r| {
        let ts = match r.get("ts").as_number() {
            Some(n) => n.as_f64() as i64,
            None => return acc,
        };
        let point = Span::new(ts, 1);
        Some(match acc {
            Some(existing) => existing.union(&point),
            None => point,
        })
    })
}
