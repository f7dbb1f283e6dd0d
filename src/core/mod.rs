//! Core abstractions: identities, targets, tasks and their execution context.

pub mod context;
pub mod graph;
pub mod retry;
pub mod target;
pub mod task;
pub mod types;
