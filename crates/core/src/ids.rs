//! Stable identifiers (spec §3 "Space", "SpanInfo").

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A space identifier, rendered as `sp_<uuid>` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpaceId(String);

impl SpaceId {
    /// Mint a new, random space id.
    pub fn new() -> Self {
        SpaceId(format!("sp_{}", Uuid::new_v4()))
    }

    /// Parse an existing id string without validating its shape; used
    /// when reloading spaces from `config.json` at startup.
    pub fn from_raw(s: impl Into<String>) -> Self {
        SpaceId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SpaceId {
    fn default() -> Self {
        SpaceId::new()
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A chunk identifier: an opaque, file-like name resolved against a
/// storage root (spec §3 "Chunks are file-like opaque identifiers").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(String);

impl ChunkId {
    pub fn new(name: impl Into<String>) -> Self {
        ChunkId(name.into())
    }

    /// Mint a fresh, randomly named chunk id.
    pub fn generate() -> Self {
        ChunkId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative path of the `.zng` log file for this chunk, always
    /// forward-slash separated regardless of host OS (spec §6).
    pub fn log_path(&self) -> String {
        format!("{}.zng", self.0)
    }

    /// Relative path of this chunk's auxiliary index directory.
    pub fn zar_dir(&self) -> String {
        format!("{}.zar", self.0)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_id_has_sp_prefix() {
        let id = SpaceId::new();
        assert!(id.as_str().starts_with("sp_"));
    }

    #[test]
    fn chunk_paths_use_forward_slash_friendly_names() {
        let c = ChunkId::new("abc123");
        assert_eq!(c.log_path(), "abc123.zng");
        assert_eq!(c.zar_dir(), "abc123.zar");
    }
}
