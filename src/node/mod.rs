//! The node contract: the pluggable unit of a pipeline.
//!
//! A [`Node`] implements up to three lifecycle hooks (`setup`, `process`,
//! `teardown`), all optional; the engine supplies [`Context::emit`] for
//! sending values downstream with round-robin fan-out. Stock implementations
//! live in [`crate::nodes`].

mod context;
mod traits;

pub use context::Context;
pub use traits::Node;
