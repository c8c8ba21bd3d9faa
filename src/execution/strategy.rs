//! Backend strategies: one shared run loop, three execution mediums.
//!
//! A [`Strategy`] bundles the three primitives a backend differs in: the
//! link type connecting nodes, the completion flag type, and the spawn
//! mechanism running [`Worker::run`]. The run loop itself is written once in
//! [`super::worker`] and never duplicated per backend.

use super::flag::{CompletionFlag, LocalFlag, SharedFlag};
use super::mode::Backend;
use super::worker::Worker;
use crate::error::{Error, Result};
use crate::link::{IpcLink, LinkRx, LinkTx, LocalLink};
use std::sync::Arc;
use std::thread::JoinHandle;

/// The concurrency primitives of one backend.
pub(crate) trait Strategy: Send + Sync {
    /// Which backend this strategy implements.
    fn backend(&self) -> Backend;

    /// Create a link suitable for this backend's workers.
    fn new_link(&self) -> Result<(Box<dyn LinkTx>, Box<dyn LinkRx>)>;

    /// Create a completion flag suitable for this backend's workers.
    fn new_flag(&self) -> Result<Arc<dyn CompletionFlag>>;

    /// Start a worker on this backend's execution medium.
    fn spawn(&self, worker: Worker) -> Result<WorkerHandle>;
}

/// Build the strategy for a backend.
pub(crate) fn strategy_for(backend: Backend) -> Arc<dyn Strategy> {
    match backend {
        Backend::Process => Arc::new(ProcessStrategy),
        Backend::Thread => Arc::new(ThreadStrategy),
        Backend::Sync => Arc::new(SyncStrategy),
    }
}

/// Handle to a spawned worker, used by the driver to reap and join.
pub(crate) enum WorkerHandle {
    /// Synchronous workers have already run to completion.
    Sync,
    /// Thread-backed worker.
    Thread(Option<JoinHandle<()>>),
    /// Process-backed worker (forked child).
    Process { pid: libc::pid_t, reaped: bool },
}

impl WorkerHandle {
    /// Non-blocking check for a worker process that has already exited.
    ///
    /// Returns the raw wait status if this call reaped the child. Used by
    /// the driver to detect workers that died without signalling their flag
    /// (killed, segfaulted) so the pipeline fails instead of hanging.
    pub(crate) fn try_reap(&mut self) -> Result<Option<i32>> {
        match self {
            Self::Process { pid, reaped } if !*reaped => {
                let mut status = 0;
                loop {
                    let rc = unsafe { libc::waitpid(*pid, &mut status, libc::WNOHANG) };
                    match rc {
                        0 => return Ok(None),
                        -1 => {
                            let err = std::io::Error::last_os_error();
                            if err.raw_os_error() == Some(libc::EINTR) {
                                continue;
                            }
                            return Err(err.into());
                        }
                        _ => {
                            *reaped = true;
                            return Ok(Some(status));
                        }
                    }
                }
            }
            _ => Ok(None),
        }
    }

    /// Block until the worker has fully finished and release its resources.
    pub(crate) fn join(&mut self) -> Result<()> {
        match self {
            Self::Sync => Ok(()),
            Self::Thread(handle) => match handle.take() {
                Some(handle) => handle
                    .join()
                    .map_err(|_| Error::Node("worker thread panicked outside its run loop".into())),
                None => Ok(()),
            },
            Self::Process { pid, reaped } => {
                if *reaped {
                    return Ok(());
                }
                let mut status = 0;
                loop {
                    let rc = unsafe { libc::waitpid(*pid, &mut status, 0) };
                    if rc == *pid {
                        *reaped = true;
                        return Ok(());
                    }
                    if rc == -1 {
                        let err = std::io::Error::last_os_error();
                        if err.raw_os_error() == Some(libc::EINTR) {
                            continue;
                        }
                        return Err(err.into());
                    }
                }
            }
        }
    }
}

/// Describe a raw wait status for failure reporting.
pub(crate) fn describe_exit(status: i32) -> String {
    if libc::WIFEXITED(status) {
        format!("exited with status {}", libc::WEXITSTATUS(status))
    } else if libc::WIFSIGNALED(status) {
        format!("killed by signal {}", libc::WTERMSIG(status))
    } else {
        format!("stopped with wait status {status}")
    }
}

/// Parallel-process backend: `fork(2)` per worker, IPC links, shared-memory
/// flags.
pub(crate) struct ProcessStrategy;

impl Strategy for ProcessStrategy {
    fn backend(&self) -> Backend {
        Backend::Process
    }

    fn new_link(&self) -> Result<(Box<dyn LinkTx>, Box<dyn LinkRx>)> {
        let (tx, rx) = IpcLink::pair()?;
        Ok((Box::new(tx), Box::new(rx)))
    }

    fn new_flag(&self) -> Result<Arc<dyn CompletionFlag>> {
        Ok(Arc::new(SharedFlag::new()?))
    }

    fn spawn(&self, worker: Worker) -> Result<WorkerHandle> {
        match unsafe { libc::fork() } {
            -1 => Err(std::io::Error::last_os_error().into()),
            0 => {
                // Child: run the worker and leave without unwinding the
                // parent's state copied into this address space.
                worker.run();
                unsafe { libc::_exit(0) }
            }
            pid => Ok(WorkerHandle::Process { pid, reaped: false }),
        }
    }
}

/// Parallel-thread backend: one OS thread per worker, in-process links and
/// flags.
pub(crate) struct ThreadStrategy;

impl Strategy for ThreadStrategy {
    fn backend(&self) -> Backend {
        Backend::Thread
    }

    fn new_link(&self) -> Result<(Box<dyn LinkTx>, Box<dyn LinkRx>)> {
        let (tx, rx) = LocalLink::unbounded();
        Ok((Box::new(tx), Box::new(rx)))
    }

    fn new_flag(&self) -> Result<Arc<dyn CompletionFlag>> {
        Ok(Arc::new(LocalFlag::new()))
    }

    fn spawn(&self, worker: Worker) -> Result<WorkerHandle> {
        let name = format!("flowpipe-{}-{}", worker.node_name, worker.index);
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || worker.run())?;
        Ok(WorkerHandle::Thread(Some(handle)))
    }
}

/// Synchronous backend: the run loop executes inline in the caller.
///
/// Requires the graph to be acyclic; the driver checks this before
/// activation, because an upstream node must be driven to completion before
/// its downstream can observe it as output-complete.
pub(crate) struct SyncStrategy;

impl Strategy for SyncStrategy {
    fn backend(&self) -> Backend {
        Backend::Sync
    }

    fn new_link(&self) -> Result<(Box<dyn LinkTx>, Box<dyn LinkRx>)> {
        let (tx, rx) = LocalLink::unbounded();
        Ok((Box::new(tx), Box::new(rx)))
    }

    fn new_flag(&self) -> Result<Arc<dyn CompletionFlag>> {
        Ok(Arc::new(LocalFlag::new()))
    }

    fn spawn(&self, worker: Worker) -> Result<WorkerHandle> {
        worker.run();
        Ok(WorkerHandle::Sync)
    }
}
