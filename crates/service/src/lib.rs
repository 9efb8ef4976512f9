//! `zqd`: the process that owns a [`space_registry::SpaceRegistry`] and
//! serves search/ingest/pcap over HTTP (spec §2 "zqd", §6). This crate
//! is the orchestration layer sitting on top of `zq-core`'s types,
//! `zq-storage`/`zq-archive`'s persistence, and `zq-executor`'s
//! processor pipeline — it owns none of those concerns itself, only
//! the wiring between them and the wire protocol in `zq-wire`.

pub mod config;
pub mod http;
pub mod ingest;
pub mod pcap;
pub mod search;
pub mod space;
pub mod space_registry;
pub mod store;

pub use config::ServerConfig;
pub use http::{router, AppState};
pub use space::SpaceConfig;
pub use space_registry::SpaceRegistry;
