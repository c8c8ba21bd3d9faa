//! Sequence source node.

use crate::error::Result;
use crate::node::{Context, Node};
use crate::value::Value;

/// Emits every item of a sequence during setup, then terminates.
///
/// A pure source: it has no inputs, so each worker sees its upstream set as
/// complete on the first pass and finishes after one loop iteration.
///
/// # Example
///
/// ```rust
/// use flowpipe::nodes::IterSrc;
///
/// let src = IterSrc::new(0..10i64);
/// let words = IterSrc::new(["alpha", "beta"]);
/// ```
#[derive(Clone)]
pub struct IterSrc {
    items: Vec<Value>,
}

impl IterSrc {
    /// Create a source over any sequence of values.
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }
}

impl Node for IterSrc {
    fn setup(&mut self, ctx: &mut Context) -> Result<()> {
        for item in std::mem::take(&mut self.items) {
            ctx.emit(item)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::Backend;
    use crate::pipeline::Pipeline;

    #[test]
    fn test_iter_src_emits_all() {
        let pipeline = Pipeline::with_backend(Backend::Sync);
        let src = pipeline.add(IterSrc::new(0..4i64)).unwrap();
        assert_eq!(
            src.results().unwrap(),
            vec![Value::Int(0), Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }
}
