//! `zq-archive` — archive metadata and pcap slicer (spec §4.2, §4.3).
//!
//! An archive is a directory of immutable `.zng` chunks described by a
//! `zar.json` metadata document; spans are consulted only for
//! archive-backed spaces (as opposed to single-log spaces) and for
//! pcap search.

pub mod archive;
pub mod metadata;
pub mod slicer;

pub use archive::{Archive, ArchiveOpenOptions};
pub use metadata::{Metadata, SpanInfo, METADATA_FILENAME};
pub use slicer::{generate_slices, ByteRange, Index, IndexSection, NoPcapsFound};
