//! The directory encoder (spec §4.9): routes records to one file per
//! `_path` field or per type-id, opening files lazily on first match
//! and disambiguating with a `#N` suffix when more than one type
//! shares a `_path`. Grounded on
//! `examples/original_source/emitter/dir.go`.

use crate::encoder::Encoder;
use crate::record_json::record_to_json;
use std::collections::HashMap;
use std::sync::Arc;
use zq_core::{Record, Result, TypeId};
use zq_storage::{Source, Uri};

/// Key a lazily-opened file is tracked under: the record's declared
/// `_path` (or a default name when absent) paired with its type,
/// matching the Go emitter's `(path, type)` file table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FileKey {
    path: String,
    type_id: TypeId,
}

struct OpenFile {
    writer: Box<dyn std::io::Write + Send>,
}

/// Routes records into per-`_path` (or per-type, when `_path` is
/// absent) files under a directory root, one JSON object per line.
///
/// `_path` is stripped from the emitted record — it is routing
/// metadata, not event data, matching the Go emitter's behavior of
/// consuming the field rather than re-emitting it.
pub struct DirectoryEncoder {
    source: Arc<dyn Source>,
    root: Uri,
    default_name: String,
    files: HashMap<FileKey, OpenFile>,
    /// Disambiguator counters per raw `_path` value, so that a second
    /// distinct type sharing a path gets `<path>-1.ndjson`,
    /// `<path>-2.ndjson`, etc. (spec §4.9 "a `#N` disambiguator is
    /// appended").
    path_type_order: HashMap<String, Vec<TypeId>>,
}

impl DirectoryEncoder {
    pub fn new(source: Arc<dyn Source>, root: Uri) -> Self {
        DirectoryEncoder {
            source,
            root,
            default_name: "default".to_string(),
            files: HashMap::new(),
            path_type_order: HashMap::new(),
        }
    }

    fn file_name_for(&mut self, raw_path: &str, type_id: TypeId) -> String {
        let order = self.path_type_order.entry(raw_path.to_string()).or_default();
        let index = match order.iter().position(|t| *t == type_id) {
            Some(i) => i,
            None => {
                order.push(type_id);
                order.len() - 1
            }
        };
        if index == 0 {
            format!("{raw_path}.ndjson")
        } else {
            format!("{raw_path}#{index}.ndjson")
        }
    }

    fn file_for(&mut self, record: &Record) -> Result<&mut OpenFile> {
        let raw_path = match record.get("_path") {
            zq_core::Value::String(s) => s,
            _ => self.default_name.clone(),
        };
        let key = FileKey {
            path: raw_path.clone(),
            type_id: record.type_id(),
        };
        if !self.files.contains_key(&key) {
            let file_name = self.file_name_for(&raw_path, record.type_id());
            if let Some(dir_maker) = self.source.as_dir_maker() {
                dir_maker.mkdir_all(&self.root)?;
            }
            let uri = self.root.append_path(&file_name);
            let writer = self.source.open_writer(&uri)?;
            self.files.insert(key.clone(), OpenFile { writer });
        }
        Ok(self.files.get_mut(&key).expect("just inserted"))
    }
}

impl Encoder for DirectoryEncoder {
    fn write(&mut self, record: &Record) -> Result<()> {
        let mut value = record_to_json(record);
        if let Some(obj) = value.as_object_mut() {
            obj.remove("_path");
        }
        let file = self.file_for(record)?;
        serde_json::to_writer(&mut file.writer, &value)?;
        file.writer.write_all(b"\n")?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        for (_, file) in self.files.iter_mut() {
            file.writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zq_core::{TypeId, Value};
    use zq_storage::LocalSource;

    fn rec_with_path(path: &str, type_id: u32, field: i64) -> Record {
        Record::new(
            TypeId(type_id),
            vec![
                ("_path".into(), Value::String(path.into())),
                ("n".into(), Value::Int(field)),
            ],
        )
    }

    #[test]
    fn routes_records_to_files_named_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = Uri::from_path(dir.path());
        let source: Arc<dyn Source> = Arc::new(LocalSource);
        let mut enc = DirectoryEncoder::new(source, root);
        enc.write(&rec_with_path("conn", 0, 1)).unwrap();
        enc.write(&rec_with_path("dns", 0, 2)).unwrap();
        enc.close().unwrap();
        assert!(dir.path().join("conn.ndjson").exists());
        assert!(dir.path().join("dns.ndjson").exists());
    }

    #[test]
    fn distinct_types_sharing_a_path_get_disambiguated() {
        let dir = tempfile::tempdir().unwrap();
        let root = Uri::from_path(dir.path());
        let source: Arc<dyn Source> = Arc::new(LocalSource);
        let mut enc = DirectoryEncoder::new(source, root);
        enc.write(&rec_with_path("conn", 0, 1)).unwrap();
        enc.write(&rec_with_path("conn", 1, 2)).unwrap();
        enc.close().unwrap();
        assert!(dir.path().join("conn.ndjson").exists());
        assert!(dir.path().join("conn#1.ndjson").exists());
    }

    #[test]
    fn records_without_path_go_to_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = Uri::from_path(dir.path());
        let source: Arc<dyn Source> = Arc::new(LocalSource);
        let mut enc = DirectoryEncoder::new(source, root);
        let r = Record::new(TypeId(0), vec![("n".into(), Value::Int(1))]);
        enc.write(&r).unwrap();
        enc.close().unwrap();
        assert!(dir.path().join("default.ndjson").exists());
    }

    #[test]
    fn emitted_record_strips_path_field() {
        let dir = tempfile::tempdir().unwrap();
        let root = Uri::from_path(dir.path());
        let source: Arc<dyn Source> = Arc::new(LocalSource);
        let mut enc = DirectoryEncoder::new(source, root.clone());
        enc.write(&rec_with_path("conn", 0, 1)).unwrap();
        enc.close().unwrap();
        let content = std::fs::read_to_string(dir.path().join("conn.ndjson")).unwrap();
        let v: serde_json::Value = serde_json::from_str(content.trim()).unwrap();
        assert!(v.get("_path").is_none());
        assert_eq!(v["n"], 1);
    }
}
