//! Function-mapping transform node.

use crate::error::Result;
use crate::node::{Context, Node};
use crate::value::Value;
use std::sync::Arc;

type MapFn = dyn Fn(Value) -> Result<Value> + Send + Sync;

/// Applies a function to each incoming value and emits the result.
///
/// # Example
///
/// ```rust
/// use flowpipe::nodes::Map;
/// use flowpipe::Value;
///
/// let square = Map::new(|v| Value::Int(v.as_int().unwrap_or(0).pow(2)));
/// ```
#[derive(Clone)]
pub struct Map {
    f: Arc<MapFn>,
}

impl Map {
    /// Map with an infallible function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            f: Arc::new(move |v| Ok(f(v))),
        }
    }

    /// Map with a function that may fail; an error marks the worker failed
    /// and is surfaced by `execute()`/`results()`.
    pub fn fallible<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }
}

impl Node for Map {
    fn process(&mut self, value: Value, ctx: &mut Context) -> Result<()> {
        ctx.emit((self.f)(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::execution::Backend;
    use crate::nodes::IterSrc;
    use crate::pipeline::Pipeline;

    #[test]
    fn test_map_squares_in_order() {
        let pipeline = Pipeline::with_backend(Backend::Sync);
        let src = pipeline.add(IterSrc::new([1i64, 2, 3])).unwrap();
        let square = pipeline
            .add(Map::new(|v| Value::Int(v.as_int().unwrap_or(0).pow(2))))
            .unwrap();
        src.feeds_into(&square).unwrap();
        assert_eq!(
            square.results().unwrap(),
            vec![Value::Int(1), Value::Int(4), Value::Int(9)]
        );
    }

    #[test]
    fn test_fallible_map_surfaces_failure() {
        let pipeline = Pipeline::with_backend(Backend::Sync);
        let src = pipeline.add(IterSrc::new([1i64])).unwrap();
        let failing = pipeline
            .add(Map::fallible(|_| Err(Error::Node("rejected".into()))))
            .unwrap();
        src.feeds_into(&failing).unwrap();
        assert!(matches!(
            failing.results(),
            Err(Error::WorkerFailures(f)) if f[0].message.contains("rejected")
        ));
    }
}
