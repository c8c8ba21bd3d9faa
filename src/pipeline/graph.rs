//! Pipeline graph storage.
//!
//! The graph owns every registered node spec: its worker factory, worker
//! count, completion flags, and the link endpoints of its inbound and
//! outbound edges. Handles refer into the graph by [`NodeId`]; the graph is
//! frozen (no wiring, no new nodes) once the pipeline starts.

use crate::error::{Error, Result};
use crate::execution::NodeFlags;
use crate::link::{LinkRx, LinkTx};
use crate::node::Node;
use std::collections::HashSet;
use std::sync::Arc;

/// Unique identifier for a node in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// An outbound edge: sender endpoint plus the consuming node.
pub(crate) struct OutputEdge {
    pub tx: Box<dyn LinkTx>,
    pub downstream: NodeId,
}

/// An inbound edge: receiver endpoint plus the producing node.
///
/// `upstream` is `None` for unbound inputs created by `feed`; those keep
/// their sender around so values can be preloaded before start, and carry
/// their own completion flag, signalled once the preload has fully reached
/// the link.
pub(crate) struct InputEdge {
    pub rx: Box<dyn LinkRx>,
    pub upstream: Option<NodeId>,
    pub feed_tx: Option<Box<dyn LinkTx>>,
    pub feed_flags: Option<Arc<NodeFlags>>,
}

/// Everything the driver needs to activate one node.
pub(crate) struct NodeSpec {
    pub name: String,
    pub factory: Box<dyn Fn() -> Box<dyn Node> + Send>,
    pub workers: usize,
    pub flags: Arc<NodeFlags>,
    pub inputs: Vec<InputEdge>,
    pub outputs: Vec<OutputEdge>,
    pub result_tx: Option<Box<dyn LinkTx>>,
}

/// The pipeline graph: node specs plus a global started flag.
#[derive(Default)]
pub(crate) struct Graph {
    pub nodes: Vec<NodeSpec>,
    pub started: bool,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Fails once the pipeline has started.
    pub fn add_node(
        &mut self,
        name: String,
        factory: Box<dyn Fn() -> Box<dyn Node> + Send>,
        workers: usize,
        flags: Arc<NodeFlags>,
    ) -> Result<NodeId> {
        if self.started {
            return Err(Error::AlreadyStarted(
                "cannot add nodes once the pipeline is running",
            ));
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeSpec {
            name,
            factory,
            workers,
            flags,
            inputs: Vec::new(),
            outputs: Vec::new(),
            result_tx: None,
        });
        Ok(id)
    }

    /// Wire `upstream -> downstream` through a fresh link.
    ///
    /// Registered as an output of `upstream` and an input of `downstream`,
    /// both in call order. Fails once the pipeline has started.
    pub fn link(
        &mut self,
        upstream: NodeId,
        downstream: NodeId,
        tx: Box<dyn LinkTx>,
        rx: Box<dyn LinkRx>,
    ) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyStarted(
                "cannot change links once the pipeline is running",
            ));
        }
        self.nodes[downstream.0].inputs.push(InputEdge {
            rx,
            upstream: Some(upstream),
            feed_tx: None,
            feed_flags: None,
        });
        self.nodes[upstream.0].outputs.push(OutputEdge { tx, downstream });
        Ok(())
    }

    /// Attach (once) an unbound input to `node`, keeping its sender for
    /// preloading values and a flag signalled when the preload is flushed.
    pub fn unbound_input(
        &mut self,
        node: NodeId,
        tx: Box<dyn LinkTx>,
        rx: Box<dyn LinkRx>,
        flags: Arc<NodeFlags>,
    ) -> Result<()> {
        if self.started {
            return Err(Error::AlreadyStarted(
                "cannot feed values once the pipeline is running",
            ));
        }
        self.nodes[node.0].inputs.push(InputEdge {
            rx,
            upstream: None,
            feed_tx: Some(tx),
            feed_flags: Some(flags),
        });
        Ok(())
    }

    /// Find the existing unbound input of `node`, if any.
    pub fn feed_edge(&mut self, node: NodeId) -> Option<&mut InputEdge> {
        self.nodes[node.0]
            .inputs
            .iter_mut()
            .find(|e| e.upstream.is_none())
    }

    /// Resolve the terminal node from `entry`: follow outbound link index 0
    /// until a node with no outbound links is reached.
    ///
    /// Single-chain resolution only; sibling sinks reached through other
    /// link indices are not considered. A cycle along index 0 is a graph
    /// error rather than an endless walk.
    pub fn terminal_from(&self, entry: NodeId) -> Result<NodeId> {
        let mut current = entry;
        let mut visited = HashSet::new();
        while let Some(edge) = self.nodes[current.0].outputs.first() {
            if !visited.insert(current) {
                return Err(Error::Graph(
                    "cycle encountered while resolving the terminal node".into(),
                ));
            }
            current = edge.downstream;
        }
        Ok(current)
    }

    /// Collect every node connected to `entry`, following links in both
    /// directions. This is the set activation covers; nodes in other
    /// components stay idle.
    pub fn component_of(&self, entry: NodeId) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut queue = vec![entry];
        let mut members = Vec::new();
        seen.insert(entry);
        while let Some(id) = queue.pop() {
            members.push(id);
            let spec = &self.nodes[id.0];
            let neighbors = spec
                .inputs
                .iter()
                .filter_map(|e| e.upstream)
                .chain(spec.outputs.iter().map(|e| e.downstream));
            for next in neighbors {
                if seen.insert(next) {
                    queue.push(next);
                }
            }
        }
        members
    }

    /// Order `members` so every node appears after all of its upstreams
    /// (Kahn's algorithm, restricted to the member set).
    ///
    /// The sync backend requires this: a worker runs inline to completion
    /// when spawned, so its upstreams must already have run or it polls
    /// their flags forever.
    pub fn topological(&self, members: &[NodeId]) -> Result<Vec<NodeId>> {
        let member_set: HashSet<NodeId> = members.iter().copied().collect();
        let mut indegree: std::collections::HashMap<NodeId, usize> = members
            .iter()
            .map(|&id| {
                let n = self.nodes[id.0]
                    .inputs
                    .iter()
                    .filter_map(|e| e.upstream)
                    .filter(|u| member_set.contains(u))
                    .count();
                (id, n)
            })
            .collect();

        let mut ready: Vec<NodeId> = members
            .iter()
            .copied()
            .filter(|id| indegree[id] == 0)
            .collect();
        let mut order = Vec::with_capacity(members.len());
        while let Some(id) = ready.pop() {
            order.push(id);
            for edge in &self.nodes[id.0].outputs {
                if let Some(n) = indegree.get_mut(&edge.downstream) {
                    *n -= 1;
                    if *n == 0 {
                        ready.push(edge.downstream);
                    }
                }
            }
        }
        if order.len() != members.len() {
            return Err(Error::Graph(
                "the sync backend requires an acyclic graph".into(),
            ));
        }
        Ok(order)
    }

    /// Verify the whole graph is acyclic (required by the sync backend).
    pub fn check_acyclic(&self) -> Result<()> {
        // Iterative DFS with three colors: 0 unvisited, 1 on stack, 2 done.
        let mut color = vec![0u8; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if color[start] != 0 {
                continue;
            }
            let mut stack = vec![(start, 0usize)];
            color[start] = 1;
            while let Some(&(node, edge)) = stack.last() {
                let outputs = &self.nodes[node].outputs;
                if edge < outputs.len() {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    let next = outputs[edge].downstream.0;
                    match color[next] {
                        0 => {
                            color[next] = 1;
                            stack.push((next, 0));
                        }
                        1 => {
                            return Err(Error::Graph(format!(
                                "the sync backend requires an acyclic graph (cycle through '{}')",
                                self.nodes[next].name
                            )));
                        }
                        _ => {}
                    }
                } else {
                    color[node] = 2;
                    stack.pop();
                }
            }
        }
        Ok(())
    }
}
