//! Worker backend selection.
//!
//! The backend decides how a node's workers execute and which link and flag
//! primitives connect them. It is injected explicitly at pipeline
//! construction; the only place the environment is consulted is
//! [`Backend::from_env`], the entry-point convenience used by
//! `Pipeline::new`.

use crate::error::{Error, Result};
use std::str::FromStr;

/// Environment variable consulted by [`Backend::from_env`].
pub const BACKEND_ENV: &str = "FLOWPIPE_BACKEND";

/// Execution backend for every worker of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// One forked OS process per worker.
    ///
    /// Links are Unix datagram socketpairs, completion flags live in shared
    /// memory. Workers are fully isolated; node state is copied into each
    /// worker at the fork.
    #[default]
    Process,

    /// One OS thread per worker, within the driving process.
    ///
    /// Links are kanal channels, flags are in-process atomics.
    Thread,

    /// No concurrency: each worker's run loop executes inline, to
    /// completion, while the graph is activated.
    ///
    /// Upstream nodes are driven before their downstreams, so the graph must
    /// be acyclic; the driver rejects cycles up front. Intended for
    /// deterministic, debuggable testing.
    Sync,
}

impl Backend {
    /// Read the backend from [`BACKEND_ENV`], defaulting to
    /// [`Backend::Process`] when the variable is unset.
    ///
    /// Fails fast with a configuration error on an unrecognized value.
    pub fn from_env() -> Result<Self> {
        match std::env::var(BACKEND_ENV) {
            Ok(raw) => raw.parse(),
            Err(std::env::VarError::NotPresent) => Ok(Self::default()),
            Err(e) => Err(Error::Config(format!("{BACKEND_ENV}: {e}"))),
        }
    }

    /// Stable lowercase name, matching the accepted configuration values.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Thread => "thread",
            Self::Sync => "sync",
        }
    }
}

impl FromStr for Backend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "process" => Ok(Self::Process),
            "thread" => Ok(Self::Thread),
            "sync" => Ok(Self::Sync),
            other => Err(Error::Config(format!(
                "unrecognized backend {other:?} (expected \"process\", \"thread\", or \"sync\")"
            ))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        assert_eq!("process".parse::<Backend>().unwrap(), Backend::Process);
        assert_eq!("thread".parse::<Backend>().unwrap(), Backend::Thread);
        assert_eq!("sync".parse::<Backend>().unwrap(), Backend::Sync);
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["", "threads", "multiprocessing", "SYNC"] {
            assert!(matches!(bad.parse::<Backend>(), Err(Error::Config(_))));
        }
    }

    #[test]
    fn test_display_round_trips() {
        for backend in [Backend::Process, Backend::Thread, Backend::Sync] {
            assert_eq!(backend.to_string().parse::<Backend>().unwrap(), backend);
        }
    }

    #[test]
    fn test_default_is_process() {
        assert_eq!(Backend::default(), Backend::Process);
    }
}
