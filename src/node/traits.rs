//! Core node trait.

use super::Context;
use crate::error::Result;
use crate::value::Value;

/// A pluggable processing unit.
///
/// Each of a node's workers runs an independent clone of the node value
/// (`Pipeline::add` requires `Clone`), so hook implementations own their
/// state without synchronization; under the process backend the clone lives
/// in a forked child, matching the isolation the other backends get from
/// cloning.
///
/// All hooks default to no-ops. Returning an error from any hook marks the
/// worker output-complete with the failure attached; the engine also catches
/// panics the same way, so a misbehaving node never stalls the pipeline.
///
/// # Example
///
/// ```rust
/// use flowpipe::node::{Context, Node};
/// use flowpipe::{Result, Value};
///
/// /// Sums integers and emits the total at teardown.
/// #[derive(Clone, Default)]
/// struct Sum {
///     total: i64,
/// }
///
/// impl Node for Sum {
///     fn process(&mut self, value: Value, _ctx: &mut Context) -> Result<()> {
///         self.total += value.as_int().unwrap_or(0);
///         Ok(())
///     }
///
///     fn teardown(&mut self, ctx: &mut Context) -> Result<()> {
///         ctx.emit(self.total)
///     }
/// }
/// ```
pub trait Node: Send + 'static {
    /// Called once per worker when the worker starts. May emit.
    fn setup(&mut self, ctx: &mut Context) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Called once per value dequeued from any input link. May emit zero,
    /// one, or many values.
    fn process(&mut self, value: Value, ctx: &mut Context) -> Result<()> {
        let _ = (value, ctx);
        Ok(())
    }

    /// Called once per worker after every input is confirmed complete and
    /// drained. May emit.
    fn teardown(&mut self, ctx: &mut Context) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}
