//! Worker completion flags.
//!
//! Each worker owns one flag; a node is output-complete once every flag in
//! its set is signalled. The flag also carries the worker's failure, if any,
//! so a failed worker still reads as complete and never stalls its
//! downstream nodes.
//!
//! Two implementations back the flag seam:
//!
//! - [`LocalFlag`]: in-process atomics, for the thread and sync backends.
//! - [`SharedFlag`]: a memfd-backed shared memory page (created before the
//!   fork, visible to every worker process), for the process backend.

use crate::error::{Error, Result};
use rustix::mm::{MapFlags, ProtFlags};
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

const STATE_RUNNING: u32 = 0;
const STATE_OK: u32 = 1;
const STATE_FAILED: u32 = 2;

/// Capacity of the error message carried by a shared flag.
const ERR_CAP: usize = 512;

/// Completion signal owned by a single worker.
pub trait CompletionFlag: Send + Sync {
    /// Mark the worker complete without error.
    fn complete_ok(&self);

    /// Mark the worker complete with an attached failure message.
    fn complete_err(&self, message: &str);

    /// Whether the worker has signalled completion (ok or failed).
    fn is_complete(&self) -> bool;

    /// The attached failure message, if the worker failed.
    fn error(&self) -> Option<String>;
}

/// The completion flags of one node, one per worker.
pub struct NodeFlags {
    flags: Vec<Arc<dyn CompletionFlag>>,
}

impl NodeFlags {
    /// Build a flag set from per-worker flags.
    pub fn new(flags: Vec<Arc<dyn CompletionFlag>>) -> Self {
        Self { flags }
    }

    /// A node is output-complete iff every worker has signalled.
    pub fn is_complete(&self) -> bool {
        self.flags.iter().all(|f| f.is_complete())
    }

    /// Flag of worker `index`.
    pub fn get(&self, index: usize) -> Arc<dyn CompletionFlag> {
        Arc::clone(&self.flags[index])
    }

    /// Collect `(worker index, message)` for every failed worker.
    pub fn errors(&self) -> Vec<(usize, String)> {
        self.flags
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.error().map(|msg| (i, msg)))
            .collect()
    }
}

/// In-process completion flag (thread and sync backends).
#[derive(Default)]
pub struct LocalFlag {
    state: AtomicU8,
    message: Mutex<Option<String>>,
}

impl LocalFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CompletionFlag for LocalFlag {
    fn complete_ok(&self) {
        self.state.store(STATE_OK as u8, Ordering::Release);
    }

    fn complete_err(&self, message: &str) {
        *self.message.lock().unwrap() = Some(message.to_string());
        self.state.store(STATE_FAILED as u8, Ordering::Release);
    }

    fn is_complete(&self) -> bool {
        self.state.load(Ordering::Acquire) != STATE_RUNNING as u8
    }

    fn error(&self) -> Option<String> {
        if self.state.load(Ordering::Acquire) == STATE_FAILED as u8 {
            self.message.lock().unwrap().clone()
        } else {
            None
        }
    }
}

/// Layout of the shared memory page behind a [`SharedFlag`].
///
/// The error bytes are atomic so concurrent readers in other processes never
/// race the failing worker's write; `state` is stored last with release
/// ordering, so a reader that observes `FAILED` also observes the message.
#[repr(C)]
struct FlagPage {
    state: AtomicU32,
    err_len: AtomicU32,
    err: [AtomicU8; ERR_CAP],
}

/// Cross-process completion flag in a memfd-backed shared mapping.
///
/// Created in the driver process before workers fork, so parent and every
/// child address the same physical page.
pub struct SharedFlag {
    page: NonNull<FlagPage>,
    len: usize,
    // Keeps the memfd alive for the lifetime of the mapping.
    _fd: std::os::fd::OwnedFd,
}

// The mapping is shared memory accessed only through atomics.
unsafe impl Send for SharedFlag {}
unsafe impl Sync for SharedFlag {}

impl SharedFlag {
    /// Allocate a zeroed shared flag page.
    pub fn new() -> Result<Self> {
        let len = std::mem::size_of::<FlagPage>();

        let fd = rustix::fs::memfd_create("flowpipe-flag", rustix::fs::MemfdFlags::CLOEXEC)?;
        rustix::fs::ftruncate(&fd, len as u64)?;

        let base = unsafe {
            rustix::mm::mmap(
                std::ptr::null_mut(),
                len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &fd,
                0,
            )?
        };
        let page = NonNull::new(base.cast::<FlagPage>())
            .ok_or_else(|| Error::Link("mmap returned null for shared flag".into()))?;

        // ftruncate guarantees the page starts zeroed, i.e. STATE_RUNNING.
        Ok(Self {
            page,
            len,
            _fd: fd,
        })
    }

    fn page(&self) -> &FlagPage {
        unsafe { self.page.as_ref() }
    }
}

impl CompletionFlag for SharedFlag {
    fn complete_ok(&self) {
        self.page().state.store(STATE_OK, Ordering::Release);
    }

    fn complete_err(&self, message: &str) {
        let page = self.page();
        let bytes = message.as_bytes();
        let n = bytes.len().min(ERR_CAP);
        for (slot, &b) in page.err.iter().zip(&bytes[..n]) {
            slot.store(b, Ordering::Relaxed);
        }
        page.err_len.store(n as u32, Ordering::Relaxed);
        page.state.store(STATE_FAILED, Ordering::Release);
    }

    fn is_complete(&self) -> bool {
        self.page().state.load(Ordering::Acquire) != STATE_RUNNING
    }

    fn error(&self) -> Option<String> {
        let page = self.page();
        if page.state.load(Ordering::Acquire) != STATE_FAILED {
            return None;
        }
        let n = (page.err_len.load(Ordering::Relaxed) as usize).min(ERR_CAP);
        let bytes: Vec<u8> = page.err[..n]
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Drop for SharedFlag {
    fn drop(&mut self) {
        unsafe {
            let _ = rustix::mm::munmap(self.page.as_ptr().cast(), self.len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_flag_lifecycle() {
        let flag = LocalFlag::new();
        assert!(!flag.is_complete());
        assert_eq!(flag.error(), None);

        flag.complete_ok();
        assert!(flag.is_complete());
        assert_eq!(flag.error(), None);
    }

    #[test]
    fn test_local_flag_error() {
        let flag = LocalFlag::new();
        flag.complete_err("boom");
        assert!(flag.is_complete());
        assert_eq!(flag.error(), Some("boom".into()));
    }

    #[test]
    fn test_shared_flag_lifecycle() {
        let flag = SharedFlag::new().unwrap();
        assert!(!flag.is_complete());

        flag.complete_ok();
        assert!(flag.is_complete());
        assert_eq!(flag.error(), None);
    }

    #[test]
    fn test_shared_flag_error_message() {
        let flag = SharedFlag::new().unwrap();
        flag.complete_err("worker exploded");
        assert!(flag.is_complete());
        assert_eq!(flag.error(), Some("worker exploded".into()));
    }

    #[test]
    fn test_shared_flag_error_truncation() {
        let flag = SharedFlag::new().unwrap();
        let long = "x".repeat(ERR_CAP + 100);
        flag.complete_err(&long);
        assert_eq!(flag.error().unwrap().len(), ERR_CAP);
    }

    #[test]
    fn test_node_flags_all_required() {
        let a: Arc<dyn CompletionFlag> = Arc::new(LocalFlag::new());
        let b: Arc<dyn CompletionFlag> = Arc::new(LocalFlag::new());
        let set = NodeFlags::new(vec![Arc::clone(&a), Arc::clone(&b)]);

        assert!(!set.is_complete());
        a.complete_ok();
        assert!(!set.is_complete());
        b.complete_err("late failure");
        assert!(set.is_complete());
        assert_eq!(set.errors(), vec![(1, "late failure".to_string())]);
    }
}
