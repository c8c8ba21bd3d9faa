//! Pass-through node.

use crate::error::Result;
use crate::node::{Context, Node};
use crate::value::Value;

/// Re-emits every incoming value unchanged.
///
/// Useful as a debug point, a fan-out sibling, or a single-worker ordering
/// barrier in front of a collector.
#[derive(Clone, Default)]
pub struct Identity;

impl Identity {
    /// Create a new identity node.
    pub fn new() -> Self {
        Self
    }
}

impl Node for Identity {
    fn process(&mut self, value: Value, ctx: &mut Context) -> Result<()> {
        ctx.emit(value)
    }
}
