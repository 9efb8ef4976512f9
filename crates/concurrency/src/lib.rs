//! `zq-concurrency` — the per-space operation guard (spec §4.8).
//!
//! Gates in-flight query/ingest operations against space deletion: a
//! delete request waits for every operation that was already running
//! to finish, and refuses new operations from the moment it starts.

pub mod guard;
pub mod registry;

pub use guard::{GuardHandle, SpaceGuard};
pub use registry::GuardRegistry;
