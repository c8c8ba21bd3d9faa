//! Pipeline construction surface: [`Pipeline`] and [`NodeHandle`].

use super::driver;
use super::graph::{Graph, NodeId};
use crate::error::{Error, Result};
use crate::execution::{strategy_for, Backend, NodeFlags, Strategy};
use crate::link::LinkRx;
use crate::node::Node;
use crate::value::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_NODE_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Shared state behind a pipeline and all of its node handles.
pub(crate) struct PipelineInner {
    pub strategy: Arc<dyn Strategy>,
    pub graph: Mutex<Graph>,
    pub workers: Mutex<Vec<driver::SpawnedWorker>>,
    pub result_rx: Mutex<Option<Box<dyn LinkRx>>>,
}

/// A dataflow pipeline: a directed graph of nodes executed by one backend.
///
/// The backend is injected at construction and consulted whenever a node is
/// registered, replacing any process-global backend state; [`Pipeline::new`]
/// is the entry-point convenience that sources it from the
/// [`FLOWPIPE_BACKEND`](crate::execution::BACKEND_ENV) environment variable.
///
/// # Example
///
/// ```rust
/// use flowpipe::nodes::{IterSrc, Map};
/// use flowpipe::{Backend, Pipeline, Value};
///
/// # fn main() -> flowpipe::Result<()> {
/// let pipeline = Pipeline::with_backend(Backend::Sync);
/// let src = pipeline.add(IterSrc::new(1..=3i64))?;
/// let square = pipeline.add(Map::new(|v| {
///     Value::Int(v.as_int().unwrap_or(0).pow(2))
/// }))?;
/// src.feeds_into(&square)?;
///
/// assert_eq!(
///     square.results()?,
///     vec![Value::Int(1), Value::Int(4), Value::Int(9)]
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    /// Create a pipeline with the backend sourced from the environment.
    ///
    /// Fails fast with a configuration error on an unrecognized value.
    pub fn new() -> Result<Self> {
        Ok(Self::with_backend(Backend::from_env()?))
    }

    /// Create a pipeline running on an explicit backend.
    pub fn with_backend(backend: Backend) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                strategy: strategy_for(backend),
                graph: Mutex::new(Graph::new()),
                workers: Mutex::new(Vec::new()),
                result_rx: Mutex::new(None),
            }),
        }
    }

    /// The backend this pipeline's workers execute on.
    pub fn backend(&self) -> Backend {
        self.inner.strategy.backend()
    }

    /// Register a node with a single worker.
    pub fn add<N: Node + Clone>(&self, node: N) -> Result<NodeHandle> {
        self.add_workers(node, 1)
    }

    /// Register a node with `workers` parallel workers.
    ///
    /// The worker count is fixed here and never changes afterwards. Each
    /// worker runs an independent clone of `node`. More than one worker may
    /// reorder the node's output relative to its input.
    pub fn add_workers<N: Node + Clone>(&self, node: N, workers: usize) -> Result<NodeHandle> {
        if workers == 0 {
            return Err(Error::Config("worker count must be at least 1".into()));
        }

        let type_name = std::any::type_name::<N>()
            .rsplit("::")
            .next()
            .unwrap_or("node");
        let name = format!("{type_name}{}", NEXT_NODE_SEQ.fetch_add(1, Ordering::Relaxed));

        // Flags exist from registration time so other nodes can observe
        // this one long before its workers spawn.
        let mut flags = Vec::with_capacity(workers);
        for _ in 0..workers {
            flags.push(self.inner.strategy.new_flag()?);
        }

        let factory = Box::new(move || Box::new(node.clone()) as Box<dyn Node>);
        let id = self.inner.graph.lock().unwrap().add_node(
            name,
            factory,
            workers,
            Arc::new(NodeFlags::new(flags)),
        )?;
        Ok(NodeHandle {
            inner: Arc::clone(&self.inner),
            id,
        })
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.inner.graph.lock().unwrap().nodes.len()
    }
}

/// Handle to one node of a [`Pipeline`].
///
/// Cheap to clone; all handles share the pipeline's graph. Wiring
/// (`infrom`/`feeds_into`) and execution (`start`/`execute`/`results`) are
/// exposed on the handle so chains read in flow order.
#[derive(Clone)]
pub struct NodeHandle {
    pub(crate) inner: Arc<PipelineInner>,
    pub(crate) id: NodeId,
}

impl NodeHandle {
    /// Connect `upstream`'s output to this node's input over a new link.
    ///
    /// Returns the upstream handle, supporting right-to-left chaining.
    /// Fails with an invalid-state error once the pipeline has started.
    /// Multiple calls create independent fan-in links, drained in
    /// registration order.
    pub fn infrom(&self, upstream: &NodeHandle) -> Result<NodeHandle> {
        if !Arc::ptr_eq(&self.inner, &upstream.inner) {
            return Err(Error::Graph(
                "cannot link nodes from different pipelines".into(),
            ));
        }
        let (tx, rx) = self.inner.strategy.new_link()?;
        self.inner
            .graph
            .lock()
            .unwrap()
            .link(upstream.id, self.id, tx, rx)?;
        Ok(upstream.clone())
    }

    /// Connect this node's output to `downstream`'s input over a new link.
    ///
    /// Equivalent to `downstream.infrom(self)`; returns the downstream
    /// handle, supporting left-to-right chaining. Successive downstream
    /// connections are fed round-robin by `emit`.
    ///
    /// Not named `into`: that would be shadowed at every call site by the
    /// blanket `Into::into` from the prelude.
    pub fn feeds_into(&self, downstream: &NodeHandle) -> Result<NodeHandle> {
        downstream.infrom(self)?;
        Ok(downstream.clone())
    }

    /// Preload values into this node's unbound input link.
    ///
    /// The link is created on first use and has no upstream node; it
    /// carries its own completion flag, signalled at start once the
    /// preload has fully reached the link, so workers drain every fed
    /// value and then terminate. Never blocks, and pre-start only.
    pub fn feed<I>(&self, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let mut graph = self.inner.graph.lock().unwrap();
        if graph.started {
            return Err(Error::AlreadyStarted(
                "cannot feed values once the pipeline is running",
            ));
        }
        if graph.feed_edge(self.id).is_none() {
            let (tx, rx) = self.inner.strategy.new_link()?;
            let flag = self.inner.strategy.new_flag()?;
            graph.unbound_input(self.id, tx, rx, Arc::new(NodeFlags::new(vec![flag])))?;
        }
        let edge = graph
            .feed_edge(self.id)
            .ok_or_else(|| Error::Graph("unbound input not found".into()))?;
        let tx = edge
            .feed_tx
            .as_ref()
            .ok_or_else(|| Error::Graph("unbound input has no sender".into()))?;
        for value in values {
            tx.push(value.into())?;
        }
        Ok(())
    }

    /// Start the whole graph without blocking for completion.
    ///
    /// Spawns every node connected to this one, each exactly once
    /// regardless of entry point; the sync backend spawns in topological
    /// order since its workers run inline. Fails with an invalid-state
    /// error if the pipeline has already started.
    pub fn start(&self) -> Result<()> {
        driver::start(&self.inner, self.id)
    }

    /// Start the graph and block until the terminal node's workers have
    /// all signalled completion, then surface any aggregated worker
    /// failures.
    pub fn execute(&self) -> Result<()> {
        driver::execute(&self.inner, self.id).map(|_| ())
    }

    /// Run the pipeline to completion and return the values collected at
    /// the terminal node, in append order.
    ///
    /// The terminal node is resolved by following outbound link index 0
    /// from this node until a node with no outbound links is reached.
    /// Append order across multiple terminal workers is not deterministic;
    /// run the terminal node with a single worker when order matters.
    pub fn results(&self) -> Result<Vec<Value>> {
        driver::results(&self.inner, self.id)
    }

    /// Name of the underlying node (type name plus registration sequence).
    pub fn name(&self) -> String {
        self.inner.graph.lock().unwrap().nodes[self.id.0].name.clone()
    }

    /// Identifier of the underlying node.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl PipelineInner {
    pub(crate) fn push_workers(&self, spawned: Vec<driver::SpawnedWorker>) {
        self.workers.lock().unwrap().extend(spawned);
    }

    pub(crate) fn take_result_rx(&self) -> Option<Box<dyn LinkRx>> {
        self.result_rx.lock().unwrap().take()
    }
}
