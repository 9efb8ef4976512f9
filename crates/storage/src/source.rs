//! The `Source` capability trait (spec §4.1).
//!
//! A `Source` is registered per URI scheme and exposes the mandatory
//! operations (`open_reader`/`open_writer`/`remove`/`remove_all`/
//! `exists`) plus three *optional* capabilities advertised by a
//! capability-query method rather than by downcasting: directory
//! creation, atomic replace, and rename. Callers check
//! `source.as_atomic_writer()` and fall back to a plain write when it
//! returns `None`, per spec §4.1's documented non-atomic degradation.

use crate::uri::Uri;
use std::io::{Read, Write};
use zq_core::Result;

/// Mandatory storage operations every scheme must provide.
pub trait Source: Send + Sync {
    /// Open a reader over the object at `uri`.
    fn open_reader(&self, uri: &Uri) -> Result<Box<dyn Read + Send>>;

    /// Open a writer that (over)writes the object at `uri`.
    fn open_writer(&self, uri: &Uri) -> Result<Box<dyn Write + Send>>;

    /// Remove a single object. Missing-object semantics are
    /// scheme-specific; use [`Source::remove_all`] when "already gone"
    /// should not be an error.
    fn remove(&self, uri: &Uri) -> Result<()>;

    /// Recursively remove everything under `uri`. Per spec §4.1, a
    /// missing `uri` is **not** an error.
    fn remove_all(&self, uri: &Uri) -> Result<()>;

    /// `true` if an object exists at `uri`. Per spec §4.1 this method
    /// itself never reports "missing" as an error — only genuine I/O
    /// failure propagates as `Err`.
    fn exists(&self, uri: &Uri) -> Result<bool>;

    /// Capability query: directory creation, or `None` if unsupported.
    fn as_dir_maker(&self) -> Option<&dyn DirMaker> {
        None
    }

    /// Capability query: atomic replace, or `None` if unsupported.
    fn as_atomic_writer(&self) -> Option<&dyn AtomicWriter> {
        None
    }

    /// Capability query: rename, or `None` if unsupported.
    fn as_renamer(&self) -> Option<&dyn Renamer> {
        None
    }
}

/// Optional capability: create a directory tree.
pub trait DirMaker: Send + Sync {
    fn mkdir_all(&self, uri: &Uri) -> Result<()>;
}

/// Optional capability: atomic whole-object replace.
///
/// Contract (spec §4.1): on success, any prior content at `uri` is
/// replaced as an indivisible observation to concurrent readers; on
/// failure `uri` either retains its prior content or is absent, never
/// partially written.
pub trait AtomicWriter: Send + Sync {
    fn atomic_write(&self, uri: &Uri, bytes: &[u8]) -> Result<()>;
}

/// Optional capability: rename an object in place.
pub trait Renamer: Send + Sync {
    fn rename(&self, from: &Uri, to: &Uri) -> Result<()>;
}

/// Write `bytes` to `uri`, preferring the source's atomic-write
/// capability and degrading to a plain write+close otherwise (spec
/// §4.1).
pub fn write_all(source: &dyn Source, uri: &Uri, bytes: &[u8]) -> Result<()> {
    if let Some(atomic) = source.as_atomic_writer() {
        return atomic.atomic_write(uri, bytes);
    }
    let mut w = source.open_writer(uri)?;
    w.write_all(bytes)?;
    w.flush()?;
    Ok(())
}

/// Read the entire object at `uri` into memory.
pub fn read_all(source: &dyn Source, uri: &Uri) -> Result<Vec<u8>> {
    let mut r = source.open_reader(uri)?;
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    Ok(buf)
}
