//! `zq-wire` — output encoders (spec §4.9) and the NDJSON streaming
//! control-frame protocol (spec §6) the search/ingest orchestrator
//! wraps them in.

pub mod directory;
pub mod encoder;
pub mod protocol;
pub mod record_json;

pub use directory::DirectoryEncoder;
pub use encoder::{Encoder, EventFrameEncoder, JsonRecordsEncoder, TextEncoder};
pub use record_json::{json_to_record, json_to_value, record_to_json, value_to_json};
