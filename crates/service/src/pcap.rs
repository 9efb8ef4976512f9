//! Pcap association and query (`POST /pcap/{space}`, `GET /pcap`, spec
//! §4.3, §6). Grounded on `examples/original_source/zqd/handlers.go`'s
//! `handlePcapPost`/`handlePcapSearch` for the guard-then-respond shape
//! and on [`zq_archive::slicer`] for the byte-range math itself.
//!
//! Per spec §1, parsing a pcap file's own framing is out of scope —
//! the slicer only ever sees `(ts, offset)` samples already recorded
//! in a `packets.idx.json` produced by an external analyzer. `ingest_pcap`
//! therefore does not build that index; it associates a path with the
//! space and reports its size, trusting the index to already be (or
//! soon be) written alongside it by that analyzer.

use std::sync::Arc;
use zq_archive::{generate_slices, ByteRange, Index};
use zq_core::{Error, Result, SpaceId, Span};
use zq_storage::{Source, Uri};
use zq_wire::protocol::{PcapPostRequest, PcapPostStatus};

use crate::space_registry::SpaceRegistry;

pub type Frame = serde_json::Value;

/// Filename of the pcap index within a space's root, alongside its
/// `config.json`/`info.json` (spec §6 "Space on-disk").
pub const INDEX_FILENAME: &str = "packets.idx.json";

fn frame(value: impl serde::Serialize) -> Frame {
    serde_json::to_value(value).expect("protocol frames always serialize")
}

/// Associate a pcap file with a space (spec §4.3 "Pcap ingest stub").
///
/// Streams a single [`PcapPostStatus`] frame reporting the file's size;
/// `span` is left unset since computing it requires parsing packets,
/// which this layer does not do.
pub fn ingest_pcap(
    registry: &SpaceRegistry,
    id: &SpaceId,
    request: PcapPostRequest,
    mut emit: impl FnMut(Frame) -> std::io::Result<()>,
) -> Result<()> {
    let config = registry.get(id)?;
    let guard = registry.guards().get_or_create(&config.id);
    let handle = guard.acquire()?;

    let result = (|| -> Result<()> {
        let source = registry.source();
        let pcap_uri = Uri::parse(&request.path);
        if !source.exists(&pcap_uri)? {
            return Err(Error::not_found(format!("pcap file not found: {}", request.path)));
        }
        let bytes = zq_storage::read_all(source.as_ref(), &pcap_uri)?;
        let total_size = bytes.len() as i64;

        registry.set_pcap_path(id, request.path.clone())?;

        let _ = emit(frame(PcapPostStatus {
            start_time: 0,
            update_time: 0,
            pcap_total_size: total_size,
            pcap_read_size: total_size,
            snapshot_count: 0,
            span: None,
        }));
        Ok(())
    })();

    drop(handle);
    result
}

/// The result of a pcap span query: which file to read and which byte
/// ranges within it cover the requested span (spec §4.3).
pub struct PcapSlices {
    pub path: String,
    pub ranges: Vec<ByteRange>,
}

/// Resolve a time span against a space's pcap index (spec §6 `GET
/// /pcap`). Per spec §1's non-goal, `proto`/`src_host`/`dst_host`/ports
/// are accepted by the HTTP layer but not consulted here — the slicer's
/// index has no packet-level fields to filter on, only `(ts, offset)`.
pub fn query_pcap(registry: &SpaceRegistry, id: &SpaceId, span: Span) -> Result<PcapSlices> {
    let config = registry.get(id)?;
    let pcap_path = config
        .pcap_path
        .clone()
        .ok_or_else(|| Error::invalid("space has no associated pcap file"))?;

    let source = registry.source();
    let index_uri = config.root().append_path(INDEX_FILENAME);
    let index_bytes = zq_storage::read_all(source.as_ref(), &index_uri)?;
    let index: Index = serde_json::from_slice(&index_bytes)?;

    let ranges = generate_slices(&index, span)
        .map_err(|_| Error::not_found("no pcaps found covering the requested span"))?;

    Ok(PcapSlices { path: pcap_path, ranges })
}
