//! Worker execution: backend selection, completion flags, and the shared
//! run loop.
//!
//! Three backends execute the identical run-loop algorithm; the
//! [`Strategy`](strategy) seam swaps only the execution medium and the
//! matching link/flag primitives:
//!
//! - **process**: one forked OS process per worker, datagram IPC links,
//!   shared-memory completion flags
//! - **thread**: one OS thread per worker, kanal links, atomic flags
//! - **sync**: inline execution during graph activation, for deterministic
//!   testing (requires an acyclic graph)
//!
//! Completion detection is polling-based: a worker sleeps [`POLL_INTERVAL`]
//! between passes, and performs one guaranteed final drain of its inputs
//! after observing every upstream node output-complete.

mod flag;
mod mode;
mod strategy;
mod worker;

pub use mode::{Backend, BACKEND_ENV};
pub use worker::POLL_INTERVAL;

pub(crate) use flag::{CompletionFlag, NodeFlags};
pub(crate) use strategy::{describe_exit, strategy_for, Strategy, WorkerHandle};
pub(crate) use worker::{InputPort, Worker};
