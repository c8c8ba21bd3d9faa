//! Pipeline construction and execution.
//!
//! This module provides the graph-wide infrastructure:
//!
//! - [`Pipeline`]: backend configuration plus the node registry
//! - [`NodeHandle`]: wiring (`infrom`/`feeds_into`/`feed`) and execution
//!   (`start`/`execute`/`results`) surface of one node
//! - [`NodeId`]: stable identifier of a registered node
//!
//! # Example
//!
//! ```rust,no_run
//! use flowpipe::nodes::{ConsoleSink, FileLines, Grep};
//! use flowpipe::Pipeline;
//!
//! # fn main() -> flowpipe::Result<()> {
//! let pipeline = Pipeline::new()?;
//! let lines = pipeline.add(FileLines::new("input.txt"))?;
//! let matching = pipeline.add(Grep::new("dog$")?)?;
//! let sink = pipeline.add(ConsoleSink::new())?;
//! lines.feeds_into(&matching)?.feeds_into(&sink)?;
//! sink.execute()?;
//! # Ok(())
//! # }
//! ```

mod builder;
mod driver;
mod graph;

pub use builder::{NodeHandle, Pipeline};
pub use graph::NodeId;
