//! Pipeline driver: graph activation, completion wait, and result
//! collection.
//!
//! The driver has no global scheduler. Whatever node it is invoked on, it
//! spawns the node's whole connected component (topologically for the sync
//! backend, whose workers run inline to completion), and completion is
//! observed by polling the terminal node's flags at the same interval the
//! workers themselves poll at. While waiting, the driver also drains the
//! result link and reaps worker processes that died without signalling, so
//! a crashed worker surfaces as a failure instead of a hang.

use super::builder::PipelineInner;
use super::graph::{Graph, NodeId};
use crate::error::{Error, Result, WorkerFailure};
use crate::execution::{describe_exit, CompletionFlag, InputPort, NodeFlags, Strategy, Worker,
    WorkerHandle, POLL_INTERVAL};
use crate::link::LinkTx;
use crate::node::Context;
use crate::value::Value;
use smallvec::SmallVec;
use std::sync::Arc;

/// A spawned worker tracked by the driver until the pipeline drains.
pub(crate) struct SpawnedWorker {
    pub handle: WorkerHandle,
    pub flag: Arc<dyn CompletionFlag>,
    pub node: String,
    pub index: usize,
}

/// Start the graph from `entry`. Fails if the pipeline already started.
///
/// Activation covers the whole connected component around `entry`. Under
/// the sync backend workers run inline to completion, so nodes spawn in
/// topological order (upstreams fully drained first); the concurrent
/// backends poll, so any spawn order drains the same way.
pub(crate) fn start(inner: &Arc<PipelineInner>, entry: NodeId) -> Result<()> {
    let sync = inner.strategy.backend() == crate::execution::Backend::Sync;

    let mut graph = inner.graph.lock().unwrap();
    if graph.started {
        return Err(Error::AlreadyStarted(
            "cannot start a pipeline that has already been run",
        ));
    }
    if sync {
        graph.check_acyclic()?;
    }
    graph.started = true;

    let members = graph.component_of(entry);
    let order = if sync {
        graph.topological(&members)?
    } else {
        members
    };

    tracing::debug!(
        "starting pipeline: {} of {} node(s), backend {}",
        order.len(),
        graph.nodes.len(),
        inner.strategy.backend()
    );

    // Preloaded inputs count as drained only once their flag is signalled.
    // The process backend flushes after the fork (children must be reading
    // or a large preload fills the socket buffer and blocks forever); the
    // in-process backends flush up front, before any inline worker runs.
    let feeds = collect_feed_flushes(&graph, &order);
    if inner.strategy.backend() == crate::execution::Backend::Process {
        spawn_in_order(inner, &graph, &order)?;
        for (tx, flag) in feeds {
            std::thread::spawn(move || flush_feed(tx.as_ref(), flag.as_ref()));
        }
    } else {
        for (tx, flag) in feeds {
            flush_feed(tx.as_ref(), flag.as_ref());
        }
        spawn_in_order(inner, &graph, &order)?;
    }
    Ok(())
}

fn spawn_in_order(inner: &Arc<PipelineInner>, graph: &Graph, order: &[NodeId]) -> Result<()> {
    let mut spawned = Vec::new();
    for &id in order {
        spawn_workers(graph, id, &inner.strategy, &mut spawned)?;
    }
    inner.push_workers(spawned);
    Ok(())
}

fn collect_feed_flushes(
    graph: &Graph,
    order: &[NodeId],
) -> Vec<(Box<dyn LinkTx>, Arc<dyn CompletionFlag>)> {
    let mut feeds = Vec::new();
    for &id in order {
        for edge in &graph.nodes[id.0].inputs {
            if let (Some(tx), Some(flags)) = (&edge.feed_tx, &edge.feed_flags) {
                feeds.push((tx.clone_tx(), flags.get(0)));
            }
        }
    }
    feeds
}

/// Flush one preloaded input and signal its flag either way, so the fed
/// node terminates instead of waiting on a flush that already failed.
fn flush_feed(tx: &dyn LinkTx, flag: &dyn CompletionFlag) {
    match tx.close() {
        Ok(()) => flag.complete_ok(),
        Err(e) => {
            tracing::warn!("failed to flush preloaded input: {e}");
            flag.complete_err(&format!("preloaded input lost: {e}"));
        }
    }
}

fn spawn_workers(
    graph: &Graph,
    id: NodeId,
    strategy: &Arc<dyn Strategy>,
    spawned: &mut Vec<SpawnedWorker>,
) -> Result<()> {
    let spec = &graph.nodes[id.0];
    let upstream_flags: Vec<Option<Arc<NodeFlags>>> = spec
        .inputs
        .iter()
        .map(|e| {
            e.upstream
                .map(|u| Arc::clone(&graph.nodes[u.0].flags))
                .or_else(|| e.feed_flags.clone())
        })
        .collect();

    for index in 0..spec.workers {
        let outputs: SmallVec<[Box<dyn LinkTx>; 2]> =
            spec.outputs.iter().map(|e| e.tx.clone_tx()).collect();
        let results = spec.result_tx.as_ref().map(|tx| tx.clone_tx());
        let inputs = spec
            .inputs
            .iter()
            .zip(&upstream_flags)
            .map(|(e, flags)| InputPort {
                rx: e.rx.clone_rx(),
                upstream: flags.clone(),
            })
            .collect();
        let flag = spec.flags.get(index);

        let worker = Worker {
            node: (spec.factory)(),
            ctx: Context::new(outputs, results),
            inputs,
            flag: Arc::clone(&flag),
            node_name: spec.name.clone(),
            index,
        };
        let handle = strategy.spawn(worker)?;
        spawned.push(SpawnedWorker {
            handle,
            flag,
            node: spec.name.clone(),
            index,
        });
    }
    Ok(())
}

/// Start from `entry`, block until the terminal node completes, join every
/// worker, and return whatever the result link collected.
pub(crate) fn execute(inner: &Arc<PipelineInner>, entry: NodeId) -> Result<Vec<Value>> {
    start(inner, entry)?;

    let terminal_flags = {
        let graph = inner.graph.lock().unwrap();
        let terminal = graph.terminal_from(entry)?;
        Arc::clone(&graph.nodes[terminal.0].flags)
    };
    let result_rx = inner.take_result_rx();
    let mut collected = Vec::new();

    loop {
        if let Some(rx) = &result_rx {
            while let Some(value) = rx.try_pop()? {
                collected.push(value);
            }
        }
        reap_dead_workers(inner)?;
        if terminal_flags.is_complete() {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    // The terminal flags were observed complete above, so this is the final
    // drain: every result was pushed before its worker signalled.
    if let Some(rx) = &result_rx {
        while let Some(value) = rx.try_pop()? {
            collected.push(value);
        }
    }

    let failures = join_and_collect_failures(inner)?;
    if failures.is_empty() {
        tracing::debug!("pipeline drained, {} result value(s)", collected.len());
        Ok(collected)
    } else {
        Err(Error::WorkerFailures(failures))
    }
}

/// Designate the terminal node as result collector, run to completion, and
/// return collected values. Fails if the pipeline already started.
pub(crate) fn results(inner: &Arc<PipelineInner>, entry: NodeId) -> Result<Vec<Value>> {
    {
        let mut graph = inner.graph.lock().unwrap();
        if graph.started {
            return Err(Error::AlreadyStarted(
                "cannot collect results from a pipeline that has already been run",
            ));
        }
        let terminal = graph.terminal_from(entry)?;
        let (tx, rx) = inner.strategy.new_link()?;
        graph.nodes[terminal.0].result_tx = Some(tx);
        *inner.result_rx.lock().unwrap() = Some(rx);
    }
    execute(inner, entry)
}

/// Mark workers whose process died without signalling as failed.
fn reap_dead_workers(inner: &Arc<PipelineInner>) -> Result<()> {
    let mut workers = inner.workers.lock().unwrap();
    for worker in workers.iter_mut() {
        if let Some(status) = worker.handle.try_reap()? {
            if !worker.flag.is_complete() {
                let message = format!("worker process {}", describe_exit(status));
                tracing::warn!("'{}'[{}] {message}", worker.node, worker.index);
                worker.flag.complete_err(&message);
            }
        }
    }
    Ok(())
}

fn join_and_collect_failures(inner: &Arc<PipelineInner>) -> Result<Vec<WorkerFailure>> {
    {
        let mut workers = inner.workers.lock().unwrap();
        for worker in workers.iter_mut() {
            worker.handle.join()?;
        }
    }

    // Every flag is final after the joins; sweep them node by node.
    let graph = inner.graph.lock().unwrap();
    let mut failures = Vec::new();
    for spec in &graph.nodes {
        for (index, message) in spec.flags.errors() {
            failures.push(WorkerFailure {
                node: spec.name.clone(),
                worker: index,
                message,
            });
        }
    }
    Ok(failures)
}
