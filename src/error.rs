//! Error types for flowpipe.

use thiserror::Error;

/// Result type alias using flowpipe's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for flowpipe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Backend configuration value outside the recognized set, or an invalid
    /// worker count.
    #[error("configuration error: {0}")]
    Config(String),

    /// The pipeline graph was mutated or restarted after it began running.
    #[error("pipeline already started: {0}")]
    AlreadyStarted(&'static str),

    /// Structural problem with the pipeline graph.
    #[error("pipeline graph error: {0}")]
    Graph(String),

    /// A link could not accept or produce a value.
    #[error("link error: {0}")]
    Link(String),

    /// Value serialization at a process boundary failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failure raised by a node hook.
    #[error("node error: {0}")]
    Node(String),

    /// One or more workers failed while the pipeline ran to completion.
    #[error("{} worker(s) failed: [{}]", .0.len(),
        .0.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; "))]
    WorkerFailures(Vec<WorkerFailure>),

    /// Invalid regular expression pattern.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System call error (via rustix).
    #[error("system error: {0}")]
    System(#[from] rustix::io::Errno),
}

/// A failure recorded by a single worker of a node.
///
/// Workers never propagate hook errors or panics out of their run loop;
/// each failure is attached to the worker's completion flag and surfaced
/// by `execute()`/`results()` inside [`Error::WorkerFailures`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFailure {
    /// Name of the node the worker belongs to.
    pub node: String,
    /// Worker index within the node (0-based).
    pub worker: usize,
    /// Failure message.
    pub message: String,
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]: {}", self.node, self.worker, self.message)
    }
}
