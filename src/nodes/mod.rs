//! Stock node implementations.
//!
//! Ready-made nodes built on the [`Node`](crate::node::Node) contract:
//!
//! - [`IterSrc`]: emits the items of a sequence (pure source)
//! - [`Map`]: applies a function to each value
//! - [`Identity`]: re-emits each value unchanged
//! - [`ConsoleSink`]: prints each value
//! - [`FileLines`]: emits lines from files
//! - [`Exec`]: runs shell commands and emits their output
//! - [`Grep`]: regex filter over string values
//! - [`Reverse`]: buffers everything, emits it reversed at teardown

mod console;
mod exec;
mod file;
mod grep;
mod identity;
mod iter;
mod map;
mod reverse;

pub use console::ConsoleSink;
pub use exec::Exec;
pub use file::FileLines;
pub use grep::Grep;
pub use identity::Identity;
pub use iter::IterSrc;
pub use map::Map;
pub use reverse::Reverse;
