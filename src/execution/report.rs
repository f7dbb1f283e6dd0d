//! Outcome of a single executor run.

use std::collections::HashMap;
use std::time::Duration;

use crate::core::target::Target;
use crate::core::task::TaskFailure;
use crate::core::types::{RunId, TaskId};

/// Status of a task within a run.
///
/// `Pending -> Skipped`, or
/// `Pending -> ResolvingStaticDeps -> Running -> [RequiringDynamicDeps -> Running]* -> Done`,
/// with `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Task is known to the run but not yet examined.
    Pending,
    /// Every output already existed; the task was not executed.
    Skipped,
    /// Waiting for declared dependencies.
    ResolvingStaticDeps,
    /// Task body is executing and holds a worker slot.
    Running,
    /// Task body is suspended in `require`.
    RequiringDynamicDeps,
    /// Task body finished and every output exists.
    Done,
    /// Task failed, or a dependency it waited on failed.
    Failed,
}

impl TaskStatus {
    /// Whether the status is final for this run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Skipped | TaskStatus::Done | TaskStatus::Failed)
    }
}

/// Result of resolving a root task.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Identifier of this run.
    pub run_id: RunId,
    /// Identity of the requested task.
    pub root: TaskId,
    /// Whether the root task ended Done or Skipped.
    pub success: bool,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Final status of every task touched by the run.
    pub task_statuses: HashMap<TaskId, TaskStatus>,
    /// Outputs of the root task (empty on failure).
    pub outputs: Vec<Target>,
    /// The failure the root task ended with, naming the originating task.
    pub failure: Option<TaskFailure>,
}

impl RunReport {
    /// Get the status of a specific task.
    pub fn status(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.task_statuses.get(task_id).copied()
    }

    /// Tasks whose body ran to completion in this run, sorted by identity.
    pub fn executed_tasks(&self) -> Vec<TaskId> {
        self.with_status(TaskStatus::Done)
    }

    /// Tasks satisfied by existing artifacts, sorted by identity.
    pub fn skipped_tasks(&self) -> Vec<TaskId> {
        self.with_status(TaskStatus::Skipped)
    }

    /// Tasks that failed, sorted by identity.
    pub fn failed_tasks(&self) -> Vec<TaskId> {
        self.with_status(TaskStatus::Failed)
    }

    /// Get the number of completed tasks.
    pub fn completed_count(&self) -> usize {
        self.count(TaskStatus::Done)
    }

    /// Get the number of skipped tasks.
    pub fn skipped_count(&self) -> usize {
        self.count(TaskStatus::Skipped)
    }

    /// Get the number of failed tasks.
    pub fn failed_count(&self) -> usize {
        self.count(TaskStatus::Failed)
    }

    fn count(&self, status: TaskStatus) -> usize {
        self.task_statuses.values().filter(|s| **s == status).count()
    }

    fn with_status(&self, status: TaskStatus) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .task_statuses
            .iter()
            .filter(|(_, s)| **s == status)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}
