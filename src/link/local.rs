//! Local (in-process) links using kanal channels.

use super::{LinkRx, LinkTx};
use crate::error::{Error, Result};
use crate::value::Value;

/// A local link for passing values between workers in the same process.
///
/// This is a thin wrapper around an unbounded kanal channel, providing the
/// [`LinkTx`]/[`LinkRx`] surface the worker run loop expects. Used by the
/// thread and synchronous backends.
///
/// # Example
///
/// ```rust
/// use flowpipe::link::{LinkRx, LinkTx, LocalLink};
/// use flowpipe::Value;
///
/// let (tx, rx) = LocalLink::unbounded();
/// tx.push(Value::Int(1)).unwrap();
/// tx.push(Value::Int(2)).unwrap();
///
/// assert_eq!(rx.try_pop().unwrap(), Some(Value::Int(1)));
/// assert_eq!(rx.try_pop().unwrap(), Some(Value::Int(2)));
/// assert_eq!(rx.try_pop().unwrap(), None);
/// ```
pub struct LocalLink;

impl LocalLink {
    /// Create an unbounded local link.
    ///
    /// Unbounded by design: `emit` must never block, so a slow consumer can
    /// grow the channel without limit.
    pub fn unbounded() -> (LocalTx, LocalRx) {
        let (tx, rx) = kanal::unbounded();
        (LocalTx { inner: tx }, LocalRx { inner: rx })
    }
}

/// Sender half of a local link.
#[derive(Clone)]
pub struct LocalTx {
    inner: kanal::Sender<Value>,
}

impl LinkTx for LocalTx {
    fn push(&self, value: Value) -> Result<()> {
        self.inner
            .send(value)
            .map_err(|_| Error::Link("local link closed".into()))
    }

    fn close(&self) -> Result<()> {
        // Nothing buffered outside the channel itself; completion is
        // signalled through flags, not channel closure.
        Ok(())
    }

    fn clone_tx(&self) -> Box<dyn LinkTx> {
        Box::new(self.clone())
    }
}

/// Receiver half of a local link.
#[derive(Clone)]
pub struct LocalRx {
    inner: kanal::Receiver<Value>,
}

impl LinkRx for LocalRx {
    fn try_pop(&self) -> Result<Option<Value>> {
        // A closed-and-drained channel reads the same as an empty one; the
        // run loop terminates on upstream flags, not link state.
        Ok(self.inner.try_recv().ok().flatten())
    }

    fn clone_rx(&self) -> Box<dyn LinkRx> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_local_link_fifo() {
        let (tx, rx) = LocalLink::unbounded();

        for i in 0..100i64 {
            tx.push(Value::Int(i)).unwrap();
        }
        for i in 0..100i64 {
            assert_eq!(rx.try_pop().unwrap(), Some(Value::Int(i)));
        }
        assert_eq!(rx.try_pop().unwrap(), None);
    }

    #[test]
    fn test_local_link_threaded() {
        let (tx, rx) = LocalLink::unbounded();
        let count = 1000i64;

        let producer = thread::spawn(move || {
            for i in 0..count {
                tx.push(Value::Int(i)).unwrap();
            }
        });
        producer.join().unwrap();

        let mut received = Vec::new();
        while let Some(v) = rx.try_pop().unwrap() {
            received.push(v.as_int().unwrap());
        }
        assert_eq!(received, (0..count).collect::<Vec<_>>());
    }

    #[test]
    fn test_cloned_receivers_compete() {
        let (tx, rx) = LocalLink::unbounded();
        let rx2 = rx.clone_rx();

        tx.push(Value::Int(1)).unwrap();
        tx.push(Value::Int(2)).unwrap();

        // Each value is delivered exactly once across clones.
        let a = rx.try_pop().unwrap().unwrap();
        let b = rx2.try_pop().unwrap().unwrap();
        assert_eq!((a, b), (Value::Int(1), Value::Int(2)));
        assert_eq!(rx.try_pop().unwrap(), None);
    }

    #[test]
    fn test_closed_link_reads_empty() {
        let (tx, rx) = LocalLink::unbounded();
        tx.push(Value::Int(7)).unwrap();
        drop(tx);

        assert_eq!(rx.try_pop().unwrap(), Some(Value::Int(7)));
        assert_eq!(rx.try_pop().unwrap(), None);
    }
}
