//! NDJSON control-frame protocol for the streaming search response
//! (spec §6). Grounded on `examples/original_source/zqd/api/api.go`:
//! one JSON object per line, discriminated by its `type` field, so a
//! client can decode the response as a stream without buffering it
//! whole.

use serde::{Deserialize, Serialize};
use zq_core::{Direction, SpaceId, Span};

/// Sent once, immediately, so a client sees a task id before any
/// records arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "TaskStart")]
pub struct TaskStart {
    pub task_id: i64,
}

/// Sent once at the very end of the stream, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "TaskEnd")]
pub struct TaskEnd {
    pub task_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

/// The wire shape of a tagged [`zq_core::Error`] (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub kind: String,
    pub error: String,
}

impl From<&zq_core::Error> for ApiError {
    fn from(e: &zq_core::Error) -> Self {
        ApiError {
            kind: e.kind().to_string(),
            error: e.to_string(),
        }
    }
}

/// A batch of matched records, encoded as already-serialized JSON
/// values so the wire encoder (spec §4.10) stays decoupled from the
/// record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "SearchRecords")]
pub struct SearchRecords {
    pub channel_id: i32,
    pub records: Vec<serde_json::Value>,
}

/// A warning drained off the query's sideband (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "SearchWarning")]
pub struct SearchWarning {
    pub warning: String,
}

/// Periodic progress update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "SearchStats")]
pub struct SearchStats {
    pub start_time: i64,
    pub update_time: i64,
    pub bytes_read: i64,
    pub bytes_matched: i64,
    pub records_read: i64,
    pub records_matched: i64,
}

/// Terminal frame for a single search channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "SearchEnd")]
pub struct SearchEnd {
    pub channel_id: i32,
    pub reason: String,
}

/// Progress update for an in-flight log ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "LogPostStatus")]
pub struct LogPostStatus {
    pub log_total_size: i64,
    pub log_read_size: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "LogPostWarning")]
pub struct LogPostWarning {
    pub warning: String,
}

/// Progress update for an in-flight pcap ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename = "PcapPostStatus")]
pub struct PcapPostStatus {
    pub start_time: i64,
    pub update_time: i64,
    pub pcap_total_size: i64,
    pub pcap_read_size: i64,
    pub snapshot_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// The body of a `POST /search` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub space: SpaceId,
    /// Already-compiled query tree, serialized; the expression
    /// language itself is out of scope (spec §1).
    pub proc: serde_json::Value,
    pub span: Span,
    pub dir: DirField,
}

/// `dir` on the wire is `{-1,+1}` per spec §6, not a named enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct DirField(pub Direction);

impl TryFrom<i8> for DirField {
    type Error = String;
    fn try_from(v: i8) -> Result<Self, Self::Error> {
        Direction::from_i8(v)
            .map(DirField)
            .ok_or_else(|| format!("dir must be -1 or 1, got {v}"))
    }
}

impl From<DirField> for i8 {
    fn from(d: DirField) -> i8 {
        d.0.as_i8()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceInfo {
    pub id: SpaceId,
    pub name: String,
    pub data_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    pub size: i64,
    pub pcap_support: bool,
    pub pcap_size: i64,
    pub pcap_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpacePostRequest {
    pub name: Option<String>,
    pub data_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpacePutRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPostRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcapPostRequest {
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_start_serializes_with_type_tag() {
        let frame = TaskStart { task_id: 1 };
        let v = serde_json::to_value(&frame).unwrap();
        assert_eq!(v["type"], "TaskStart");
        assert_eq!(v["task_id"], 1);
    }

    #[test]
    fn task_end_omits_error_when_none() {
        let frame = TaskEnd {
            task_id: 1,
            error: None,
        };
        let v = serde_json::to_value(&frame).unwrap();
        assert!(v.get("error").is_none());
    }

    #[test]
    fn dir_field_rejects_zero() {
        let parsed: Result<DirField, _> = serde_json::from_str("0");
        assert!(parsed.is_err());
    }

    #[test]
    fn dir_field_round_trips_forward_and_reverse() {
        let fwd: DirField = serde_json::from_str("1").unwrap();
        assert_eq!(fwd.0, Direction::Forward);
        let rev: DirField = serde_json::from_str("-1").unwrap();
        assert_eq!(rev.0, Direction::Reverse);
    }

    #[test]
    fn api_error_carries_kind_and_message() {
        let e = zq_core::Error::not_found("space sp_x");
        let api: ApiError = (&e).into();
        assert_eq!(api.kind, "not_found");
    }
}
