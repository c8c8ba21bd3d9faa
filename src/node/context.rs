//! Per-worker emit context.

use crate::error::Result;
use crate::link::LinkTx;
use crate::value::Value;
use smallvec::SmallVec;

/// Engine-provided handle passed to every node hook.
///
/// Owns the worker's view of the node's outbound links (cloned senders in
/// registration order), the round-robin cursor, and the result sink when the
/// node is the designated terminal collector.
pub struct Context {
    outputs: SmallVec<[Box<dyn LinkTx>; 2]>,
    cursor: usize,
    results: Option<Box<dyn LinkTx>>,
}

impl Context {
    pub(crate) fn new(
        outputs: SmallVec<[Box<dyn LinkTx>; 2]>,
        results: Option<Box<dyn LinkTx>>,
    ) -> Self {
        Self {
            outputs,
            cursor: 0,
            results,
        }
    }

    /// Send a value on to the next node.
    ///
    /// If this node has outbound links, the value goes to the link selected
    /// by the round-robin cursor, which then advances (wrapping at the link
    /// count). If this worker belongs to the result collector, the value is
    /// also appended to the result sink. Never blocks: links are unbounded.
    pub fn emit(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        match (self.outputs.is_empty(), &self.results) {
            (false, results) => {
                let idx = self.cursor;
                self.cursor = (self.cursor + 1) % self.outputs.len();
                if let Some(results) = results {
                    results.push(value.clone())?;
                }
                self.outputs[idx].push(value)
            }
            (true, Some(results)) => results.push(value),
            (true, None) => Ok(()),
        }
    }

    /// Number of outbound links this worker fans out over.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Flush and release every outbound link and the result sink.
    ///
    /// Called by the run loop after teardown, before the completion flag is
    /// signalled. Returns the first failure encountered but releases every
    /// sender regardless.
    pub(crate) fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for tx in self.outputs.iter().chain(self.results.iter()) {
            if let Err(e) = tx.close() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
