//! Task execution engine.
//!
//! This module provides the execution infrastructure for resolving task
//! graphs, including external command execution and run reporting.

mod command;
mod executor;
mod report;

pub use command::{CommandOutput, ExternalCommand, ExternalCommandBuilder};
pub use executor::Executor;
pub use report::{RunReport, TaskStatus};
