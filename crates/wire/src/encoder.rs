//! The output-encoder contract (spec §4.9) and the three stream
//! encodings spec §6 names: `json-records`, `event-frames`, `text`.
//! The write/close split and the "never close stdout" rule are grounded
//! on `examples/original_source/emitter/file.go`'s `noClose` wrapper
//! around `os.Stdout`; `event-frames`' length-prefixed framing follows
//! the explicit byte-order handling in
//! `examples/original_source/pcap/pcapio/read.go`.

use crate::record_json::record_to_json;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use zq_core::{Record, Result};

/// `write`/`close` contract every encoder implements (spec §4.9).
///
/// `close` flushes any buffered state then closes the underlying
/// writer — unless that writer is stdout, which is never closed (spec
/// §4.9).
pub trait Encoder: Send {
    fn write(&mut self, record: &Record) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// `json-records`: one record per line as a compact JSON object
/// (ND-JSON), the shape `SearchRecords` batches wrap on the wire
/// (spec §6).
pub struct JsonRecordsEncoder<W: Write + Send> {
    writer: W,
    is_stdout: bool,
}

impl<W: Write + Send> JsonRecordsEncoder<W> {
    pub fn new(writer: W) -> Self {
        JsonRecordsEncoder {
            writer,
            is_stdout: false,
        }
    }

    /// Mark this encoder's writer as stdout so [`Encoder::close`]
    /// flushes without closing (spec §4.9).
    pub fn stdout(writer: W) -> Self {
        JsonRecordsEncoder {
            writer,
            is_stdout: true,
        }
    }
}

impl<W: Write + Send> Encoder for JsonRecordsEncoder<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        let v = record_to_json(record);
        serde_json::to_writer(&mut self.writer, &v)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        // Rust has no portable "close a Write" below drop; the
        // stdout/non-stdout distinction only matters for owned file
        // writers, which close on drop regardless. We keep the flag so
        // callers (and tests) can assert the contract is honored at
        // the type level even though there is nothing further to do
        // here for a generic `Write`.
        let _ = self.is_stdout;
        Ok(())
    }
}

/// `event-frames`: length-prefixed frames over a byte stream — the
/// framing half of the "reader/writer pair over a byte stream" spec §1
/// treats the event codec as. Each frame is a 4-byte little-endian
/// length prefix followed by that many bytes of the record's JSON
/// projection (the actual binary value codec is out of scope; this
/// crate only owns the framing).
pub struct EventFrameEncoder<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> EventFrameEncoder<W> {
    pub fn new(writer: W) -> Self {
        EventFrameEncoder { writer }
    }
}

impl<W: Write + Send> Encoder for EventFrameEncoder<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        let v = record_to_json(record);
        let bytes = serde_json::to_vec(&v)?;
        self.writer.write_u32::<LittleEndian>(bytes.len() as u32)?;
        self.writer.write_all(&bytes)?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// `text`: one human-readable line per record, `field=value` pairs in
/// field order, space-separated (a tzng-like rendering without the
/// type annotations the real codec would carry, per spec §1's
/// "treat the event codec as a reader/writer pair").
pub struct TextEncoder<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> TextEncoder<W> {
    pub fn new(writer: W) -> Self {
        TextEncoder { writer }
    }
}

fn render_value(value: &zq_core::Value) -> String {
    match value {
        zq_core::Value::Unset => "-".to_string(),
        zq_core::Value::Bool(b) => b.to_string(),
        zq_core::Value::Int(i) => i.to_string(),
        zq_core::Value::Float(f) => f.to_string(),
        zq_core::Value::String(s) => s.clone(),
        zq_core::Value::Bytes(b) => hex::encode(b),
        zq_core::Value::Ip(ip) => ip.to_string(),
        zq_core::Value::Time(t) => t.to_string(),
        zq_core::Value::Record(fields) => {
            let inner: Vec<String> = fields
                .iter()
                .map(|(k, v)| format!("{k}={}", render_value(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        zq_core::Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", inner.join(","))
        }
    }
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl<W: Write + Send> Encoder for TextEncoder<W> {
    fn write(&mut self, record: &Record) -> Result<()> {
        let line: Vec<String> = record
            .fields()
            .iter()
            .map(|(name, v)| format!("{name}={}", render_value(v)))
            .collect();
        writeln!(self.writer, "{}", line.join(" "))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
