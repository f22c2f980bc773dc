// file: src/exec/mod.rs
// description: external command execution module exports
// reference: internal module structure

pub mod runner;
#[cfg(test)]
pub(crate) mod testing;

pub use runner::{CommandRunner, Invocation, OutputMode, SystemRunner, ToolOutput};
