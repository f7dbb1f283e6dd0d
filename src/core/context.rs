//! Task execution context.
//!
//! A [`TaskContext`] is handed to [`Task::execute`](super::task::Task::execute).
//! It carries the resolved targets of the task's static dependencies and the
//! [`require`](TaskContext::require) entry point for dependencies discovered
//! while the task runs.
//!
//! A running task occupies one worker slot. The slot is released for the
//! duration of every `require` call and re-acquired before the task resumes,
//! so a suspended task never pins a worker while its dependencies run.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::target::Target;
use super::task::{Task, TaskError, TaskFailure};
use super::types::TaskId;

/// Resolves batches of tasks on behalf of a running task.
///
/// Implemented by the executor; tasks only see it through [`TaskContext`].
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve every task in `tasks` to a terminal state.
    ///
    /// Returns the targets of each task in batch order, or the first failure
    /// in batch order once every member is terminal.
    async fn require(
        &self,
        requester: &TaskId,
        tasks: Vec<Arc<dyn Task>>,
    ) -> Result<Vec<Vec<Target>>, TaskFailure>;
}

/// Execution context of a single task run.
pub struct TaskContext {
    task_id: TaskId,
    inputs: Vec<Vec<Target>>,
    resolver: Arc<dyn Resolver>,
    workers: Arc<Semaphore>,
    permit: Option<OwnedSemaphorePermit>,
}

impl TaskContext {
    /// Create a context for a task that already holds a worker slot.
    pub fn new(
        task_id: TaskId,
        inputs: Vec<Vec<Target>>,
        resolver: Arc<dyn Resolver>,
        workers: Arc<Semaphore>,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            task_id,
            inputs,
            resolver,
            workers,
            permit: Some(permit),
        }
    }

    /// Identity of the running task.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Targets of every static dependency, in declaration order.
    pub fn inputs(&self) -> &[Vec<Target>] {
        &self.inputs
    }

    /// Targets of the static dependency at `index`.
    pub fn input(&self, index: usize) -> Result<&[Target], TaskError> {
        self.inputs.get(index).map(Vec::as_slice).ok_or_else(|| {
            TaskError::ExecutionFailed(format!(
                "task {} has no static dependency at index {}",
                self.task_id, index
            ))
        })
    }

    /// Suspend until every task in `tasks` is terminal and return their
    /// targets in batch order.
    ///
    /// A failure of any member is returned as [`TaskError::Upstream`] after
    /// all members have finished.
    pub async fn require(
        &mut self,
        tasks: Vec<Arc<dyn Task>>,
    ) -> Result<Vec<Vec<Target>>, TaskError> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        self.permit.take();
        let resolved = self.resolver.require(&self.task_id, tasks).await;
        let permit = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|_| TaskError::ExecutionFailed("worker pool closed".to_string()))?;
        self.permit = Some(permit);

        resolved.map_err(TaskError::Upstream)
    }

    /// Convenience wrapper around [`require`](Self::require) for one task.
    pub async fn require_one(&mut self, task: Arc<dyn Task>) -> Result<Vec<Target>, TaskError> {
        let mut resolved = self.require(vec![task]).await?;
        resolved
            .pop()
            .ok_or_else(|| TaskError::ExecutionFailed("empty resolution".to_string()))
    }

    /// Whether this context currently holds a worker slot.
    pub fn holds_worker(&self) -> bool {
        self.permit.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Params;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolver that records how many workers were free while it ran.
    struct ProbeResolver {
        workers: Arc<Semaphore>,
        free_during_require: AtomicUsize,
    }

    #[async_trait]
    impl Resolver for ProbeResolver {
        async fn require(
            &self,
            _requester: &TaskId,
            tasks: Vec<Arc<dyn Task>>,
        ) -> Result<Vec<Vec<Target>>, TaskFailure> {
            self.free_during_require
                .store(self.workers.available_permits(), Ordering::SeqCst);
            Ok(tasks.iter().map(|t| t.outputs()).collect())
        }
    }

    struct Leaf(&'static str);

    #[async_trait]
    impl Task for Leaf {
        fn family(&self) -> &'static str {
            "Leaf"
        }

        fn params(&self) -> Params {
            Params::new().with("name", self.0)
        }

        fn outputs(&self) -> Vec<Target> {
            vec![Target::text(format!("/tmp/{}.txt", self.0))]
        }

        async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_require_releases_and_reacquires_worker() {
        let workers = Arc::new(Semaphore::new(1));
        let resolver = Arc::new(ProbeResolver {
            workers: Arc::clone(&workers),
            free_during_require: AtomicUsize::new(usize::MAX),
        });
        let permit = Arc::clone(&workers).acquire_owned().await.unwrap();
        let mut ctx = TaskContext::new(
            TaskId::new("parent"),
            Vec::new(),
            resolver.clone(),
            Arc::clone(&workers),
            permit,
        );
        assert_eq!(workers.available_permits(), 0);

        let resolved = ctx
            .require(vec![Arc::new(Leaf("a")), Arc::new(Leaf("b"))])
            .await
            .unwrap();

        assert_eq!(resolver.free_during_require.load(Ordering::SeqCst), 1);
        assert_eq!(workers.available_permits(), 0);
        assert!(ctx.holds_worker());
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[1], vec![Target::text("/tmp/b.txt")]);
    }

    #[tokio::test]
    async fn test_input_out_of_range_is_an_error() {
        let workers = Arc::new(Semaphore::new(1));
        let resolver = Arc::new(ProbeResolver {
            workers: Arc::clone(&workers),
            free_during_require: AtomicUsize::new(0),
        });
        let permit = Arc::clone(&workers).acquire_owned().await.unwrap();
        let ctx = TaskContext::new(
            TaskId::new("t"),
            vec![vec![Target::text("/tmp/in.json")]],
            resolver,
            workers,
            permit,
        );

        assert_eq!(ctx.input(0).unwrap().len(), 1);
        assert!(matches!(ctx.input(1), Err(TaskError::ExecutionFailed(_))));
    }
}
