//! The pull-based processor pipeline (spec §4.4): leaves scan storage,
//! operators transform one batch at a time, and a [`mux::Multiplexer`]
//! fans multiple leaves into a single consumer. Every stage implements
//! [`processor::Processor`] so the search orchestrator can build and
//! run an arbitrary tree without caring what's underneath it.

pub mod compiler;
pub mod expr;
pub mod filter;
pub mod groupby;
pub mod head;
pub mod mux;
pub mod pass_through;
pub mod processor;
pub mod reducer;
pub mod scan;
pub mod sort;
pub mod tail;

pub use compiler::{compile_program, parse, ProgramNode};
pub use filter::Filter;
pub use groupby::GroupBy;
pub use head::Head;
pub use mux::{MuxEvent, Multiplexer};
pub use pass_through::PassThrough;
pub use processor::{Context, Processor};
pub use scan::Scan;
pub use sort::Sort;
pub use tail::Tail;
