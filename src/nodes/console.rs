//! Console sink node for debugging output.

use crate::error::Result;
use crate::node::{Context, Node};
use crate::value::Value;
use std::io::Write;

/// Prints each incoming value on its own line, optionally prefixed.
///
/// A pure sink: nothing is emitted, so a chain ending here collects no
/// results.
#[derive(Clone, Default)]
pub struct ConsoleSink {
    prefix: Option<String>,
}

impl ConsoleSink {
    /// Create a sink printing values as-is.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink prefixing every line.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

impl Node for ConsoleSink {
    fn process(&mut self, value: Value, _ctx: &mut Context) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        match &self.prefix {
            Some(prefix) => writeln!(out, "{prefix} {value}")?,
            None => writeln!(out, "{value}")?,
        }
        Ok(())
    }
}
