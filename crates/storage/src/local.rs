//! Local-filesystem `Source` implementation.
//!
//! Grounded on `examples/original_source/pkg/iosrc/file.go`. Atomic
//! writes use the standard temp-file + fsync + rename dance; per the
//! Open Question in spec §9, a failed rename removes the temp file
//! rather than leaving it behind.

use crate::source::{AtomicWriter, DirMaker, Renamer, Source};
use crate::uri::Uri;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use zq_core::Result;

/// A `Source` backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalSource;

impl Source for LocalSource {
    fn open_reader(&self, uri: &Uri) -> Result<Box<dyn Read + Send>> {
        let f = File::open(uri.as_local_path())?;
        Ok(Box::new(f))
    }

    fn open_writer(&self, uri: &Uri) -> Result<Box<dyn Write + Send>> {
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(uri.as_local_path())?;
        Ok(Box::new(f))
    }

    fn remove(&self, uri: &Uri) -> Result<()> {
        fs::remove_file(uri.as_local_path())?;
        Ok(())
    }

    fn remove_all(&self, uri: &Uri) -> Result<()> {
        let path = uri.as_local_path();
        match fs::metadata(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
            Ok(meta) => {
                if meta.is_dir() {
                    fs::remove_dir_all(&path)?;
                } else {
                    fs::remove_file(&path)?;
                }
                Ok(())
            }
        }
    }

    fn exists(&self, uri: &Uri) -> Result<bool> {
        match fs::metadata(uri.as_local_path()) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn as_dir_maker(&self) -> Option<&dyn DirMaker> {
        Some(self)
    }

    fn as_atomic_writer(&self) -> Option<&dyn AtomicWriter> {
        Some(self)
    }

    fn as_renamer(&self) -> Option<&dyn Renamer> {
        Some(self)
    }
}

impl DirMaker for LocalSource {
    fn mkdir_all(&self, uri: &Uri) -> Result<()> {
        fs::create_dir_all(uri.as_local_path())?;
        Ok(())
    }
}

impl AtomicWriter for LocalSource {
    fn atomic_write(&self, uri: &Uri, bytes: &[u8]) -> Result<()> {
        let path = uri.as_local_path();
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let tmp_path = dir.join(format!(
            ".{}.tmp.{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "zq".to_string()),
            std::process::id()
        ));

        let write_result = (|| -> Result<()> {
            let mut f = File::create(&tmp_path)?;
            f.write_all(bytes)?;
            f.sync_all()?;
            Ok(())
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl Renamer for LocalSource {
    fn rename(&self, from: &Uri, to: &Uri) -> Result<()> {
        fs::rename(from.as_local_path(), to.as_local_path())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Uri::from_path(dir.path().join("zar.json"));
        let src = LocalSource;
        src.atomic_write(&uri, b"{\"version\":0}").unwrap();
        let bytes = crate::source::read_all(&src, &uri).unwrap();
        assert_eq!(bytes, b"{\"version\":0}");
    }

    #[test]
    fn atomic_write_replaces_prior_content_indivisibly() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Uri::from_path(dir.path().join("zar.json"));
        let src = LocalSource;
        src.atomic_write(&uri, b"first").unwrap();
        src.atomic_write(&uri, b"second").unwrap();
        let bytes = crate::source::read_all(&src, &uri).unwrap();
        assert_eq!(bytes, b"second");
    }

    #[test]
    fn remove_all_on_missing_path_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Uri::from_path(dir.path().join("missing"));
        let src = LocalSource;
        assert!(src.remove_all(&uri).is_ok());
    }

    #[test]
    fn exists_distinguishes_missing_from_present() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Uri::from_path(dir.path().join("f"));
        let src = LocalSource;
        assert!(!src.exists(&uri).unwrap());
        src.atomic_write(&uri, b"x").unwrap();
        assert!(src.exists(&uri).unwrap());
    }

    #[test]
    fn mkdir_all_creates_tree() {
        let dir = tempfile::tempdir().unwrap();
        let uri = Uri::from_path(dir.path().join("a/b/c"));
        let src = LocalSource;
        src.mkdir_all(&uri).unwrap();
        assert!(src.exists(&uri).unwrap());
    }
}
