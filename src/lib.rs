//! # flowpipe
//!
//! A small dataflow pipeline engine: pluggable nodes wired into a directed
//! graph, each running N parallel workers, with values flowing node-to-node
//! over unbounded FIFO links until the graph drains.
//!
//! ## Features
//!
//! - **Three interchangeable backends**: forked OS processes, OS threads,
//!   or fully synchronous inline execution for deterministic tests
//! - **One run loop**: every backend executes the same polling algorithm;
//!   only the spawn/link/flag primitives differ
//! - **Round-robin fan-out**: successive emitted values cycle across a
//!   node's outbound links deterministically
//! - **No silent stalls**: hook errors, panics, and dead worker processes
//!   are captured per worker and aggregated by `execute()`/`results()`
//!
//! ## Quick start
//!
//! ```rust
//! use flowpipe::nodes::{Grep, IterSrc};
//! use flowpipe::{Backend, Pipeline, Value};
//!
//! # fn main() -> flowpipe::Result<()> {
//! let pipeline = Pipeline::with_backend(Backend::Sync);
//! let src = pipeline.add(IterSrc::new(["dogs", "dog", "heydog", "other"]))?;
//! let grep = pipeline.add(Grep::new("dog$")?)?;
//! src.feeds_into(&grep)?;
//!
//! assert_eq!(
//!     grep.results()?,
//!     vec![Value::Str("dog".into()), Value::Str("heydog".into())]
//! );
//! # Ok(())
//! # }
//! ```
//!
//! Custom nodes implement [`node::Node`]; see [`nodes`] for the stock set.
//!
//! ## Known gaps
//!
//! Links are unbounded: a producer outrunning a slow consumer grows memory
//! without limit. There is no cancellation; a started pipeline runs to
//! natural completion. Terminal resolution follows outbound link index 0,
//! so `results()` supports a single final sink.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod execution;
pub mod link;
pub mod node;
pub mod nodes;
pub mod pipeline;
pub mod value;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result, WorkerFailure};
    pub use crate::execution::Backend;
    pub use crate::node::{Context, Node};
    pub use crate::pipeline::{NodeHandle, Pipeline};
    pub use crate::value::Value;
}

pub use error::{Error, Result, WorkerFailure};
pub use execution::Backend;
pub use pipeline::{NodeHandle, Pipeline};
pub use value::Value;
