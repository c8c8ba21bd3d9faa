//! Pipeline links: unbounded FIFO channels between one producer node and one
//! consumer node.
//!
//! Two link types cover the three worker backends:
//!
//! - [`LocalLink`]: in-process channel (kanal), used by the thread and
//!   synchronous backends.
//! - [`IpcLink`]: cross-process channel over a Unix datagram socketpair with
//!   bincode-framed values, used by the process backend.
//!
//! Both are unbounded from the emitting worker's point of view: `push` never
//! blocks. For the IPC link this is achieved with a sender-side feeder thread
//! that drains an in-memory queue into the socket, so the bounded kernel
//! buffer never stalls the emitting worker. The lack of backpressure is a
//! documented property of the engine, not an oversight: a slow consumer lets
//! the producer side grow without limit.
//!
//! The [`LinkTx`]/[`LinkRx`] traits are the seam the backend strategy plugs
//! its link type through; receivers are strictly non-blocking, because the
//! worker run loop polls rather than parks.

mod ipc;
mod local;

pub use ipc::{IpcLink, IpcRx, IpcTx, MAX_INLINE};
pub use local::{LocalLink, LocalRx, LocalTx};

use crate::error::Result;
use crate::value::Value;

/// Sender half of a link.
///
/// Cloned once per worker of the producing node; all clones feed the same
/// FIFO.
pub trait LinkTx: Send {
    /// Push a value onto the link. Never blocks.
    fn push(&self, value: Value) -> Result<()>;

    /// Flush any pending values and release the sender.
    ///
    /// Called once per worker after teardown. A no-op for in-process links;
    /// the IPC link joins its feeder thread here so every value reaches the
    /// socket before the worker signals completion.
    fn close(&self) -> Result<()>;

    /// Clone this sender behind a fresh box.
    fn clone_tx(&self) -> Box<dyn LinkTx>;
}

/// Receiver half of a link.
///
/// Cloned once per worker of the consuming node; clones compete for values
/// (each value is delivered to exactly one worker).
pub trait LinkRx: Send {
    /// Pop the next value without blocking. `Ok(None)` means the link is
    /// currently empty (or closed); completion is decided by upstream flags,
    /// never by link state.
    fn try_pop(&self) -> Result<Option<Value>>;

    /// Clone this receiver behind a fresh box.
    fn clone_rx(&self) -> Box<dyn LinkRx>;
}
