//! Archive metadata: the persistent `zar.json` (spec §3 "Archive
//! metadata", §4.2). Grounded on
//! `examples/original_source/archive/schema.go`.

use serde::{Deserialize, Serialize};
use zq_core::{ChunkId, Direction, Result, Span};
use zq_storage::{write_all, Source, Uri};

/// Filename of the metadata file within an archive root.
pub const METADATA_FILENAME: &str = "zar.json";

/// Default threshold (bytes) above which a new chunk is started.
pub const DEFAULT_CHUNK_SIZE_THRESHOLD: i64 = 500 * 1024 * 1024;

/// `(Span, ChunkID)` pair (spec §3 "SpanInfo").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanInfo {
    pub span: Span,
    pub chunk_id: ChunkId,
}

/// The on-disk archive metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub version: u32,
    pub chunk_size_threshold: i64,
    pub direction: Direction,
    pub spans: Vec<SpanInfo>,
}

impl Metadata {
    /// Default metadata for a freshly created archive.
    pub fn new(direction: Direction) -> Self {
        Metadata {
            version: 0,
            chunk_size_threshold: DEFAULT_CHUNK_SIZE_THRESHOLD,
            direction,
            spans: Vec::new(),
        }
    }

    /// Serialize and write this metadata to `uri`, preferring the
    /// source's atomic-write capability (spec §4.1/§4.2).
    pub fn write(&self, source: &dyn Source, uri: &Uri) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_all(source, uri, &bytes)
    }

    /// Load metadata from `uri`.
    pub fn read(source: &dyn Source, uri: &Uri) -> Result<Metadata> {
        let bytes = zq_storage::read_all(source, uri)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Merge `new_spans` into this metadata's span list and re-sort per
    /// the configured direction (spec §4.2 "append").
    ///
    /// Ties (equal `span.ts`) keep original insertion order — a stable
    /// sort is therefore required, not an incidental implementation
    /// detail.
    pub fn append(&mut self, new_spans: impl IntoIterator<Item = SpanInfo>) {
        self.spans.extend(new_spans);
        match self.direction {
            Direction::Forward => self.spans.sort_by_key(|s| s.span.ts),
            Direction::Reverse => {
                self.spans.sort_by(|a, b| b.span.ts.cmp(&a.span.ts));
            }
        }
    }

    /// True if `self.spans` is monotonic in the configured direction
    /// (spec §8 "Archive ordering" property).
    pub fn is_ordered(&self) -> bool {
        self.spans.windows(2).all(|w| match self.direction {
            Direction::Forward => w[0].span.ts <= w[1].span.ts,
            Direction::Reverse => w[0].span.ts >= w[1].span.ts,
        })
    }

    /// Drop the spans whose chunk id is in `ids`, leaving the rest in
    /// place (the `zar rm` maintenance command's counterpart to
    /// [`Metadata::retain_chunks`]).
    pub fn remove_chunks(&mut self, ids: &[ChunkId]) {
        self.spans.retain(|s| !ids.contains(&s.chunk_id));
    }

    /// Retain only the spans whose chunk id is in `filter`. Returns an
    /// `Invalid` error if none remain, per spec §4.2 `open(... filter?)`.
    pub fn retain_chunks(&mut self, filter: &[ChunkId]) -> Result<()> {
        self.spans.retain(|s| filter.contains(&s.chunk_id));
        if self.spans.is_empty() && !filter.is_empty() {
            return Err(zq_core::Error::invalid(
                "no spans remain after applying chunk filter",
            ));
        }
        Ok(())
    }
}
