//! `zq-core` — shared data model for the zq search/analytics engine.
//!
//! This crate holds the pieces every other crate in the workspace
//! depends on: the tagged [`error::Error`] taxonomy, half-open
//! [`span::Span`]s, the [`value::Value`] stand-in for the (externally
//! defined) event type system, and the [`record::Record`]/
//! [`record::Batch`] data model records move through the pipeline as.

pub mod error;
pub mod ids;
pub mod record;
pub mod span;
pub mod value;

pub use error::{Error, Kind, Result};
pub use ids::{ChunkId, SpaceId};
pub use record::{Batch, Record, TypeId, TypeTable};
pub use span::{Direction, Span};
pub use value::{Number, TypeTag, Value};
