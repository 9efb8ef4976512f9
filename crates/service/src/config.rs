//! Server configuration (spec §1/§9 ambient stack: CLI argument parsing
//! and env-based config loading are out of scope, but the config
//! *type* itself is ordinary ambient infrastructure). A plain struct
//! with a `Default` impl rather than a builder, since every field here
//! has a sane default — the same shape `DatabaseConfig`-style configs
//! take elsewhere in this workspace.

use std::net::SocketAddr;
use std::time::Duration;
use zq_storage::Uri;

/// Runtime configuration for the `zqd` HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Root directory under which every space's data lives.
    pub root: Uri,
    pub listen_addr: SocketAddr,
    /// Full-request deadline; `None` disables it (spec §5 "Request
    /// deadline via context — full cancellation").
    pub request_timeout: Option<Duration>,
    pub default_chunk_size_threshold: i64,
}

impl ServerConfig {
    pub fn new(root: impl Into<String>) -> Self {
        ServerConfig {
            root: Uri::parse(&root.into()),
            listen_addr: "127.0.0.1:9867".parse().unwrap(),
            request_timeout: Some(Duration::from_secs(300)),
            default_chunk_size_threshold: zq_archive::metadata::DEFAULT_CHUNK_SIZE_THRESHOLD,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::new("./zqd-root")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_a_file_scheme_root() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.root.scheme, "file");
    }

    #[test]
    fn new_parses_a_custom_root() {
        let cfg = ServerConfig::new("/data/zq");
        assert_eq!(cfg.root.path, "/data/zq");
    }
}
