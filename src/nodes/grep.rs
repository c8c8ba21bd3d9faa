//! Pattern-filtering node.

use crate::error::{Error, Result};
use crate::node::{Context, Node};
use crate::value::Value;
use regex::Regex;

/// Emits only the string values matching a regular expression, preserving
/// their relative order (with a single worker).
///
/// The match is unanchored: `Grep::new("dog$")?` passes both `"dog"` and
/// `"heydog"`.
#[derive(Clone)]
pub struct Grep {
    regex: Regex,
}

impl Grep {
    /// Compile the pattern; an invalid pattern is a construction error, not
    /// a runtime one.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

impl Node for Grep {
    fn process(&mut self, value: Value, ctx: &mut Context) -> Result<()> {
        let text = value
            .as_str()
            .ok_or_else(|| Error::Node(format!("Grep expects string values, got {value}")))?;
        if self.regex.is_match(text) {
            ctx.emit(value)?;
        }
        Ok(())
    }
}
