//! `zq-storage` — URI and storage-backend abstraction (spec §4.1).
//!
//! Unifies local filesystem and (future) object-store I/O behind a
//! single `Source` capability trait, keyed off the URI scheme by a
//! process-wide [`registry::SourceRegistry`].

pub mod local;
pub mod registry;
pub mod source;
pub mod uri;

pub use local::LocalSource;
pub use registry::SourceRegistry;
pub use source::{read_all, write_all, AtomicWriter, DirMaker, Renamer, Source};
pub use uri::Uri;
