//! Cross-process links over Unix datagram socketpairs.
//!
//! The process backend forks one OS process per worker, so link endpoints
//! must survive a `fork(2)`: a socketpair created before the fork is shared
//! through the inherited descriptor table, and datagram framing keeps
//! concurrent sends and receives from distinct worker processes atomic (one
//! datagram per value, no interleaving).
//!
//! Values are bincode-encoded per datagram. A datagram must fit in the
//! socket buffer, so a value whose encoding exceeds [`MAX_INLINE`] is
//! spilled to a file instead and the datagram carries only its path; the
//! receiving worker reads and deletes the spill file. Values of any size
//! cross the boundary either way.
//!
//! Sends never block the emitting worker: each sender clone owns (lazily,
//! in whichever process first pushes) a feeder thread that drains an
//! unbounded in-memory queue into the socket. `close` joins the feeder, so
//! every queued value has reached the socket before the owning worker
//! signals completion.

use super::{LinkRx, LinkTx};
use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::io;
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Largest encoded value sent inline in a datagram; anything bigger is
/// spilled to a file and referenced by path.
pub const MAX_INLINE: usize = 64 * 1024;

/// Headroom for the frame envelope around an inline payload.
const FRAME_OVERHEAD: usize = 64;

static SPILL_SEQ: AtomicU64 = AtomicU64::new(0);

/// One datagram on the wire.
#[derive(Serialize, Deserialize)]
enum Frame {
    Inline(Value),
    Spilled(PathBuf),
}

fn spill(encoded: &[u8]) -> Result<PathBuf> {
    // Process id plus a per-process counter keeps concurrent senders,
    // including forked children, from colliding.
    let path = std::env::temp_dir().join(format!(
        "flowpipe-spill-{}-{}",
        std::process::id(),
        SPILL_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::write(&path, encoded)?;
    Ok(path)
}

fn unspill(path: &PathBuf) -> Result<Value> {
    let bytes = std::fs::read(path)?;
    let _ = std::fs::remove_file(path);
    bincode::deserialize(&bytes).map_err(|e| Error::Serialization(e.to_string()))
}

/// A cross-process link: datagram socketpair plus bincode framing.
pub struct IpcLink;

impl IpcLink {
    /// Create a connected sender/receiver pair.
    ///
    /// The receiver side is switched to non-blocking mode; the sender side
    /// stays blocking, since only the feeder thread ever writes to it.
    pub fn pair() -> Result<(IpcTx, IpcRx)> {
        let (send_sock, recv_sock) = UnixDatagram::pair()?;
        recv_sock.set_nonblocking(true)?;

        let tx = IpcTx {
            inner: Arc::new(IpcTxInner {
                sock: Arc::new(send_sock),
                feeder: Mutex::new(None),
            }),
        };
        let rx = IpcRx {
            sock: Arc::new(recv_sock),
            buf: Arc::new(Mutex::new(vec![0u8; MAX_INLINE + FRAME_OVERHEAD])),
        };
        Ok((tx, rx))
    }
}

struct Feeder {
    queue: kanal::Sender<Vec<u8>>,
    handle: JoinHandle<io::Result<()>>,
}

struct IpcTxInner {
    sock: Arc<UnixDatagram>,
    feeder: Mutex<Option<Feeder>>,
}

impl IpcTxInner {
    fn enqueue(&self, frame: Vec<u8>) -> Result<()> {
        let mut guard = self.feeder.lock().unwrap();
        if guard.is_none() {
            let (queue_tx, queue_rx) = kanal::unbounded::<Vec<u8>>();
            let sock = Arc::clone(&self.sock);
            let handle = thread::Builder::new()
                .name("flowpipe-ipc-feeder".into())
                .spawn(move || -> io::Result<()> {
                    while let Ok(frame) = queue_rx.recv() {
                        sock.send(&frame)?;
                    }
                    Ok(())
                })?;
            *guard = Some(Feeder {
                queue: queue_tx,
                handle,
            });
        }
        let feeder = guard.as_ref().unwrap();
        feeder
            .queue
            .send(frame)
            .map_err(|_| Error::Link("ipc feeder stopped".into()))
    }
}

/// Sender half of an IPC link.
pub struct IpcTx {
    inner: Arc<IpcTxInner>,
}

impl LinkTx for IpcTx {
    fn push(&self, value: Value) -> Result<()> {
        let encoded =
            bincode::serialize(&value).map_err(|e| Error::Serialization(e.to_string()))?;
        let frame = if encoded.len() > MAX_INLINE {
            // The spill file is fully written before the datagram referring
            // to it is enqueued, so any receiver that sees the frame can
            // read the file.
            Frame::Spilled(spill(&encoded)?)
        } else {
            Frame::Inline(value)
        };
        let datagram =
            bincode::serialize(&frame).map_err(|e| Error::Serialization(e.to_string()))?;
        self.inner.enqueue(datagram)
    }

    fn close(&self) -> Result<()> {
        let feeder = self.inner.feeder.lock().unwrap().take();
        if let Some(feeder) = feeder {
            // Dropping the queue sender ends the feeder loop once it has
            // written every pending frame to the socket.
            drop(feeder.queue);
            match feeder.handle.join() {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Error::Link(format!("ipc feeder failed: {e}"))),
                Err(_) => Err(Error::Link("ipc feeder panicked".into())),
            }
        } else {
            Ok(())
        }
    }

    fn clone_tx(&self) -> Box<dyn LinkTx> {
        Box::new(IpcTx {
            inner: Arc::clone(&self.inner),
        })
    }
}

/// Receiver half of an IPC link.
pub struct IpcRx {
    sock: Arc<UnixDatagram>,
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LinkRx for IpcRx {
    fn try_pop(&self) -> Result<Option<Value>> {
        let mut buf = self.buf.lock().unwrap();
        match self.sock.recv(&mut buf) {
            Ok(n) => {
                let frame: Frame = bincode::deserialize(&buf[..n])
                    .map_err(|e| Error::Serialization(e.to_string()))?;
                match frame {
                    Frame::Inline(value) => Ok(Some(value)),
                    Frame::Spilled(path) => unspill(&path).map(Some),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clone_rx(&self) -> Box<dyn LinkRx> {
        Box::new(IpcRx {
            sock: Arc::clone(&self.sock),
            buf: Arc::new(Mutex::new(vec![0u8; MAX_INLINE + FRAME_OVERHEAD])),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipc_link_fifo() {
        let (tx, rx) = IpcLink::pair().unwrap();

        for i in 0..50i64 {
            tx.push(Value::Int(i)).unwrap();
        }
        tx.close().unwrap();

        for i in 0..50i64 {
            assert_eq!(rx.try_pop().unwrap(), Some(Value::Int(i)));
        }
        assert_eq!(rx.try_pop().unwrap(), None);
    }

    #[test]
    fn test_empty_link_is_non_blocking() {
        let (_tx, rx) = IpcLink::pair().unwrap();
        assert_eq!(rx.try_pop().unwrap(), None);
    }

    #[test]
    fn test_close_without_push() {
        let (tx, _rx) = IpcLink::pair().unwrap();
        tx.close().unwrap();
    }

    #[test]
    fn test_oversized_value_spills_and_round_trips() {
        let (tx, rx) = IpcLink::pair().unwrap();
        let payload: Vec<u8> = (0..MAX_INLINE * 3).map(|i| (i % 251) as u8).collect();
        tx.push(Value::Bytes(payload.clone())).unwrap();
        tx.close().unwrap();
        assert_eq!(rx.try_pop().unwrap(), Some(Value::Bytes(payload)));
    }

    #[test]
    fn test_string_round_trip() {
        let (tx, rx) = IpcLink::pair().unwrap();
        tx.push(Value::Str("heydog".into())).unwrap();
        tx.close().unwrap();
        assert_eq!(rx.try_pop().unwrap(), Some(Value::Str("heydog".into())));
    }
}
