//! Shell-command-executing node.

use crate::error::{Error, Result};
use crate::node::{Context, Node};
use crate::value::Value;
use std::process::Command;

/// Runs shell commands and emits their standard output as a string.
///
/// Works two ways, like [`super::FileLines`]:
/// - constructed with a command, run once during setup;
/// - constructed bare, running each incoming string value as a command.
///
/// A command that exits non-zero fails the worker.
#[derive(Clone, Default)]
pub struct Exec {
    command: Option<String>,
}

impl Exec {
    /// Run one command named at construction.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
        }
    }

    /// Run every command received from upstream.
    pub fn from_upstream() -> Self {
        Self::default()
    }

    fn run(&self, command: &str, ctx: &mut Context) -> Result<()> {
        let output = Command::new("sh").arg("-c").arg(command).output()?;
        if !output.status.success() {
            return Err(Error::Node(format!(
                "command {command:?} failed with {}",
                output.status
            )));
        }
        ctx.emit(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Node for Exec {
    fn setup(&mut self, ctx: &mut Context) -> Result<()> {
        if let Some(command) = self.command.take() {
            self.run(&command, ctx)?;
        }
        Ok(())
    }

    fn process(&mut self, value: Value, ctx: &mut Context) -> Result<()> {
        let command = value
            .as_str()
            .ok_or_else(|| Error::Node(format!("Exec expects a command string, got {value}")))?;
        self.run(command, ctx)
    }
}
