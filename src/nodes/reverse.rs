//! Buffer-then-reverse node.

use crate::error::Result;
use crate::node::{Context, Node};
use crate::value::Value;

/// Buffers every incoming value, then emits the sequence reversed during
/// teardown (after all inputs are confirmed complete and drained).
///
/// With more than one worker each worker reverses only its own share; run
/// it single-worker for a true whole-stream reversal.
#[derive(Clone, Default)]
pub struct Reverse {
    buffered: Vec<Value>,
}

impl Reverse {
    /// Create a new reverse node.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Node for Reverse {
    fn process(&mut self, value: Value, _ctx: &mut Context) -> Result<()> {
        self.buffered.push(value);
        Ok(())
    }

    fn teardown(&mut self, ctx: &mut Context) -> Result<()> {
        for value in std::mem::take(&mut self.buffered).into_iter().rev() {
            ctx.emit(value)?;
        }
        Ok(())
    }
}
