//! The shared worker run loop.
//!
//! Every backend executes this exact algorithm; only the spawn mechanism and
//! the link/flag primitives differ (see [`super::strategy`]). The loop is
//! polling-based: with no global scheduler, a worker decides it is done by
//! observing that every upstream node is output-complete and then performing
//! one guaranteed final drain of its inputs, so values emitted concurrently
//! with the completion check are never lost.

use super::flag::{CompletionFlag, NodeFlags};
use crate::error::Result;
use crate::link::LinkRx;
use crate::node::{Context, Node};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Fixed backoff between polls when a worker has nothing to do and is not
/// yet eligible to terminate.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One input link of a worker, paired with the upstream node's completion
/// flags. `upstream` is `None` for unbound inputs (preloaded via `feed`),
/// which count as complete from the start.
pub(crate) struct InputPort {
    pub rx: Box<dyn LinkRx>,
    pub upstream: Option<Arc<NodeFlags>>,
}

impl InputPort {
    fn upstream_complete(&self) -> bool {
        self.upstream.as_ref().map_or(true, |f| f.is_complete())
    }
}

/// A fully-wired execution unit for one worker of one node.
///
/// Built by the driver at activation time: a fresh clone of the user node,
/// cloned link endpoints, and this worker's completion flag. Self-contained
/// so it can run on a thread, in a forked child, or inline.
pub(crate) struct Worker {
    pub node: Box<dyn Node>,
    pub ctx: Context,
    pub inputs: Vec<InputPort>,
    pub flag: Arc<dyn CompletionFlag>,
    pub node_name: String,
    pub index: usize,
}

impl Worker {
    /// Run the worker to completion and signal its flag.
    ///
    /// Never unwinds: hook errors and panics are captured and attached to
    /// the completion flag, so the pipeline drains instead of stalling.
    pub(crate) fn run(mut self) {
        tracing::debug!("worker '{}'[{}] starting", self.node_name, self.index);

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_inner()));
        let close_result = self.ctx.close();

        match outcome {
            Ok(Ok(())) => match close_result {
                Ok(()) => {
                    tracing::debug!("worker '{}'[{}] complete", self.node_name, self.index);
                    self.flag.complete_ok();
                }
                Err(e) => {
                    tracing::warn!("worker '{}'[{}] failed to flush: {e}", self.node_name, self.index);
                    self.flag.complete_err(&e.to_string());
                }
            },
            Ok(Err(e)) => {
                tracing::warn!("worker '{}'[{}] failed: {e}", self.node_name, self.index);
                self.flag.complete_err(&e.to_string());
            }
            Err(panic) => {
                let msg = panic_message(panic);
                tracing::warn!("worker '{}'[{}] panicked: {msg}", self.node_name, self.index);
                self.flag.complete_err(&format!("panicked: {msg}"));
            }
        }
    }

    fn run_inner(&mut self) -> Result<()> {
        self.node.setup(&mut self.ctx)?;

        loop {
            // Observe completeness before draining: if every upstream was
            // already complete here, the drain below is the guaranteed final
            // pass and nothing emitted before that observation can be lost.
            let upstream_done = self.inputs.iter().all(InputPort::upstream_complete);

            for port in &self.inputs {
                while let Some(value) = port.rx.try_pop()? {
                    self.node.process(value, &mut self.ctx)?;
                }
            }

            if upstream_done {
                break;
            }
            std::thread::sleep(POLL_INTERVAL);
        }

        self.node.teardown(&mut self.ctx)
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::flag::LocalFlag;
    use crate::link::{LinkTx, LocalLink};
    use crate::value::Value;
    use smallvec::smallvec;

    /// Collects everything it sees into an output link.
    #[derive(Clone, Default)]
    struct Echo;

    impl Node for Echo {
        fn process(&mut self, value: Value, ctx: &mut Context) -> Result<()> {
            ctx.emit(value)
        }
    }

    fn flag() -> Arc<dyn CompletionFlag> {
        Arc::new(LocalFlag::new())
    }

    #[test]
    fn test_source_worker_terminates_immediately() {
        #[derive(Clone)]
        struct Src;
        impl Node for Src {
            fn setup(&mut self, ctx: &mut Context) -> Result<()> {
                for i in 0..3i64 {
                    ctx.emit(i)?;
                }
                Ok(())
            }
        }

        let (tx, rx) = LocalLink::unbounded();
        let f = flag();
        let worker = Worker {
            node: Box::new(Src),
            ctx: Context::new(smallvec![Box::new(tx) as Box<dyn LinkTx>], None),
            inputs: vec![],
            flag: Arc::clone(&f),
            node_name: "src".into(),
            index: 0,
        };
        worker.run();

        assert!(f.is_complete());
        assert_eq!(f.error(), None);
        let mut out = Vec::new();
        while let Some(v) = rx.try_pop().unwrap() {
            out.push(v.as_int().unwrap());
        }
        assert_eq!(out, vec![0, 1, 2]);
    }

    #[test]
    fn test_final_drain_after_upstream_complete() {
        // Upstream is already complete and its values are already queued;
        // the worker must still process every one of them before signalling.
        let (in_tx, in_rx) = LocalLink::unbounded();
        let (out_tx, out_rx) = LocalLink::unbounded();
        for i in 0..5i64 {
            in_tx.push(Value::Int(i)).unwrap();
        }

        let upstream_flag = flag();
        upstream_flag.complete_ok();
        let upstream = Arc::new(NodeFlags::new(vec![upstream_flag]));

        let f = flag();
        let worker = Worker {
            node: Box::new(Echo),
            ctx: Context::new(smallvec![Box::new(out_tx) as Box<dyn LinkTx>], None),
            inputs: vec![InputPort {
                rx: Box::new(in_rx),
                upstream: Some(upstream),
            }],
            flag: Arc::clone(&f),
            node_name: "echo".into(),
            index: 0,
        };
        worker.run();

        assert!(f.is_complete());
        let mut out = Vec::new();
        while let Some(v) = out_rx.try_pop().unwrap() {
            out.push(v.as_int().unwrap());
        }
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_unbound_input_counts_as_complete() {
        let (in_tx, in_rx) = LocalLink::unbounded();
        let (out_tx, out_rx) = LocalLink::unbounded();
        in_tx.push(Value::Int(9)).unwrap();

        let f = flag();
        let worker = Worker {
            node: Box::new(Echo),
            ctx: Context::new(smallvec![Box::new(out_tx) as Box<dyn LinkTx>], None),
            inputs: vec![InputPort {
                rx: Box::new(in_rx),
                upstream: None,
            }],
            flag: Arc::clone(&f),
            node_name: "echo".into(),
            index: 0,
        };
        worker.run();

        assert!(f.is_complete());
        assert_eq!(out_rx.try_pop().unwrap(), Some(Value::Int(9)));
    }

    #[test]
    fn test_hook_error_attached_to_flag() {
        #[derive(Clone)]
        struct Failing;
        impl Node for Failing {
            fn setup(&mut self, _ctx: &mut Context) -> Result<()> {
                Err(crate::error::Error::Node("bad setup".into()))
            }
        }

        let f = flag();
        let worker = Worker {
            node: Box::new(Failing),
            ctx: Context::new(smallvec![], None),
            inputs: vec![],
            flag: Arc::clone(&f),
            node_name: "failing".into(),
            index: 0,
        };
        worker.run();

        assert!(f.is_complete());
        assert_eq!(f.error(), Some("node error: bad setup".into()));
    }

    #[test]
    fn test_panic_attached_to_flag() {
        #[derive(Clone)]
        struct Panicking;
        impl Node for Panicking {
            fn setup(&mut self, _ctx: &mut Context) -> Result<()> {
                panic!("kaboom");
            }
        }

        let f = flag();
        let worker = Worker {
            node: Box::new(Panicking),
            ctx: Context::new(smallvec![], None),
            inputs: vec![],
            flag: Arc::clone(&f),
            node_name: "panicking".into(),
            index: 0,
        };
        worker.run();

        assert!(f.is_complete());
        assert_eq!(f.error(), Some("panicked: kaboom".into()));
    }
}
