//! Task resolution engine.
//!
//! The `Executor` resolves a task graph rooted at a requested task:
//! - Cache-hit short-circuit when every output already exists
//! - Per-run memoisation by identity (no identity executes twice in a run)
//! - Concurrency limiting via semaphore, released while a task is suspended
//! - Cycle detection over static and dynamic waits
//! - Identity collision detection over output locations
//! - Retry logic based on the task's retry policy

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OnceCell, Semaphore};
use tokio::time::sleep;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::core::context::{Resolver, TaskContext};
use crate::core::graph::WaitGraph;
use crate::core::target::{Artifact, Target};
use crate::core::task::{Task, TaskError, TaskFailure};
use crate::core::types::{RunId, TaskId};
use crate::events::{Event, EventBus};

use super::report::{RunReport, TaskStatus};

/// Terminal outcome of one identity within a run.
type Resolution = Result<Vec<Target>, TaskFailure>;

/// Executor for resolving task graphs with a bounded worker pool.
pub struct Executor {
    /// Maximum number of task bodies running at once.
    max_workers: usize,
    /// Optional sink for lifecycle events.
    event_bus: Option<Arc<EventBus>>,
}

impl Executor {
    /// Create a new executor with the given worker limit (at least one).
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            event_bus: None,
        }
    }

    /// Emit lifecycle events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Get the worker limit.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Resolve `task` and everything it needs.
    ///
    /// Never panics on task failure; the outcome is described by the report.
    pub async fn run(&self, task: Arc<dyn Task>) -> RunReport {
        let state = Arc::new(RunState::new(self.max_workers, self.event_bus.clone()));
        let run_id = state.run_id;
        let root = task.id();

        let span = info_span!("run", run = %run_id, root = %root);

        async move {
            info!(workers = state.workers_limit, "run started");
            state.emit(Event::run_started(run_id, root.clone())).await;

            let start_time = Instant::now();
            let resolution = resolve(Arc::clone(&state), task).await;
            let duration = start_time.elapsed();
            let success = resolution.is_ok();

            state
                .emit(Event::run_completed(run_id, root.clone(), success, duration))
                .await;

            let task_statuses = state.statuses.lock().await.clone();
            let (outputs, failure) = match resolution {
                Ok(outputs) => (outputs, None),
                Err(failure) => (Vec::new(), Some(failure)),
            };

            match failure {
                None => info!(
                    duration_ms = %duration.as_millis(),
                    tasks = task_statuses.len(),
                    "run completed"
                ),
                Some(ref f) => warn!(
                    duration_ms = %duration.as_millis(),
                    failed_task = %f.task,
                    error = %f.error,
                    "run failed"
                ),
            }

            RunReport {
                run_id,
                root,
                success,
                duration,
                task_statuses,
                outputs,
                failure,
            }
        }
        .instrument(span)
        .await
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Shared bookkeeping of one run.
struct RunState {
    run_id: RunId,
    workers_limit: usize,
    workers: Arc<Semaphore>,
    event_bus: Option<Arc<EventBus>>,
    /// identity -> outcome, initialised by whichever requester arrives first
    memo: Mutex<HashMap<TaskId, Arc<OnceCell<Resolution>>>>,
    /// output location -> identity that claimed it
    claims: Mutex<HashMap<PathBuf, TaskId>>,
    waits: Mutex<WaitGraph>,
    statuses: Mutex<HashMap<TaskId, TaskStatus>>,
}

impl RunState {
    fn new(max_workers: usize, event_bus: Option<Arc<EventBus>>) -> Self {
        Self {
            run_id: RunId::new(),
            workers_limit: max_workers,
            workers: Arc::new(Semaphore::new(max_workers)),
            event_bus,
            memo: Mutex::new(HashMap::new()),
            claims: Mutex::new(HashMap::new()),
            waits: Mutex::new(WaitGraph::new()),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(ref bus) = self.event_bus {
            bus.emit(event).await;
        }
    }

    async fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        self.statuses.lock().await.insert(task_id.clone(), status);
    }

    /// Record `id` as the owner of every output location.
    async fn claim_outputs(&self, id: &TaskId, outputs: &[Target]) -> Result<(), TaskError> {
        let mut claims = self.claims.lock().await;
        for target in outputs {
            match claims.get(target.path()) {
                Some(owner) if owner != id => {
                    return Err(TaskError::IdentityCollision {
                        location: target.path().to_path_buf(),
                        first: owner.clone(),
                        second: id.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    claims.insert(target.path().to_path_buf(), id.clone());
                }
            }
        }
        Ok(())
    }
}

/// Resolver handed to running tasks.
struct RunHandle(Arc<RunState>);

#[async_trait]
impl Resolver for RunHandle {
    async fn require(
        &self,
        requester: &TaskId,
        tasks: Vec<Arc<dyn Task>>,
    ) -> Result<Vec<Vec<Target>>, TaskFailure> {
        let state = &self.0;

        state
            .set_status(requester, TaskStatus::RequiringDynamicDeps)
            .await;
        state
            .emit(Event::task_suspended(state.run_id, requester.clone(), tasks.len()))
            .await;
        debug!(batch = tasks.len(), "suspended on dynamic dependencies");

        let resolved = require_batch(Arc::clone(state), requester, tasks).await;

        state.set_status(requester, TaskStatus::Running).await;
        state
            .emit(Event::task_resumed(state.run_id, requester.clone()))
            .await;
        debug!(ok = resolved.is_ok(), "resumed");

        resolved
    }
}

/// Resolve a batch on behalf of `requester`.
///
/// Every member is resolved on its own spawned task and every member is
/// awaited. The first failure in batch order is returned.
async fn require_batch(
    state: Arc<RunState>,
    requester: &TaskId,
    tasks: Vec<Arc<dyn Task>>,
) -> Result<Vec<Vec<Target>>, TaskFailure> {
    if tasks.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<TaskId> = tasks.iter().map(|t| t.id()).collect();

    {
        let mut waits = state.waits.lock().await;
        for (index, id) in ids.iter().enumerate() {
            if let Err(cycle) = waits.add_edge(requester, id) {
                for added in &ids[..index] {
                    waits.remove_edge(requester, added);
                }
                warn!(task = %requester, "dependency cycle detected");
                return Err(TaskFailure::new(
                    requester.clone(),
                    TaskError::DependencyCycle(cycle),
                ));
            }
        }
    }

    let handles: Vec<_> = tasks
        .into_iter()
        .map(|task| tokio::spawn(resolve(Arc::clone(&state), task)))
        .collect();

    let mut resolved = Vec::with_capacity(handles.len());
    let mut first_failure: Option<TaskFailure> = None;

    for (id, handle) in ids.iter().zip(handles) {
        let outcome = handle.await.unwrap_or_else(|e| {
            Err(TaskFailure::new(
                id.clone(),
                TaskError::ExecutionFailed(format!("resolution aborted: {e}")),
            ))
        });
        state.waits.lock().await.remove_edge(requester, id);

        match outcome {
            Ok(targets) => resolved.push(targets),
            Err(failure) => {
                if first_failure.is_none() {
                    first_failure = Some(failure);
                }
            }
        }
    }

    match first_failure {
        Some(failure) => Err(failure),
        None => Ok(resolved),
    }
}

/// Resolve one task, sharing the outcome with every other requester.
fn resolve(state: Arc<RunState>, task: Arc<dyn Task>) -> BoxFuture<'static, Resolution> {
    async move {
        let id = task.id();
        let cell = {
            let mut memo = state.memo.lock().await;
            Arc::clone(memo.entry(id.clone()).or_default())
        };

        cell.get_or_init(|| {
            let span = info_span!("task", task = %id);
            resolve_uncached(Arc::clone(&state), task, id.clone()).instrument(span)
        })
        .await
        .clone()
    }
    .boxed()
}

async fn resolve_uncached(state: Arc<RunState>, task: Arc<dyn Task>, id: TaskId) -> Resolution {
    state.set_status(&id, TaskStatus::Pending).await;

    let result = resolve_task(&state, task.as_ref(), &id).await;

    if let Err(ref failure) = result {
        state.set_status(&id, TaskStatus::Failed).await;
        warn!(failed_task = %failure.task, error = %failure.error, "task failed");
        state
            .emit(Event::task_failed(state.run_id, id, failure.to_string()))
            .await;
    }
    result
}

async fn resolve_task(state: &Arc<RunState>, task: &dyn Task, id: &TaskId) -> Resolution {
    let fail = |error: TaskError| TaskFailure::new(id.clone(), error);
    let outputs = task.outputs();

    state.claim_outputs(id, &outputs).await.map_err(fail)?;

    if !outputs.is_empty() && outputs.iter().all(|t| t.exists()) {
        for target in &outputs {
            target.verify().map_err(fail)?;
        }
        state.set_status(id, TaskStatus::Skipped).await;
        debug!("outputs exist, skipping");
        state
            .emit(Event::task_skipped(state.run_id, id.clone()))
            .await;
        return Ok(outputs);
    }

    state.set_status(id, TaskStatus::ResolvingStaticDeps).await;
    let inputs = require_batch(Arc::clone(state), id, task.dependencies()).await?;

    let retry_policy = task.retry_policy();
    let max_attempts = retry_policy.max_attempts + 1;
    let start_time = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let permit = Arc::clone(&state.workers)
            .acquire_owned()
            .await
            .map_err(|_| fail(TaskError::ExecutionFailed("worker pool closed".to_string())))?;

        state.set_status(id, TaskStatus::Running).await;
        if attempts == 1 {
            debug!(description = ?task.description(), "task started");
            state
                .emit(Event::task_started(state.run_id, id.clone()))
                .await;
        }

        let mut ctx = TaskContext::new(
            id.clone(),
            inputs.clone(),
            Arc::new(RunHandle(Arc::clone(state))),
            Arc::clone(&state.workers),
            permit,
        );
        let outcome = match task.execute(&mut ctx).await {
            Ok(()) => check_outputs(&outputs),
            Err(e) => Err(e),
        };
        drop(ctx);
        if outcome.is_err() {
            discard_outputs(&outputs);
        }

        match outcome {
            Ok(()) => {
                let duration = start_time.elapsed();
                state.set_status(id, TaskStatus::Done).await;
                info!(duration_ms = %duration.as_millis(), attempts, "task completed");
                state
                    .emit(Event::task_completed(state.run_id, id.clone(), duration))
                    .await;
                return Ok(outputs);
            }
            // the dependency already applied its own policy
            Err(TaskError::Upstream(failure)) => return Err(failure),
            Err(err) if retry_policy.should_retry_error(attempts, &err) => {
                warn!(
                    attempt = attempts,
                    max_attempts,
                    error = %err,
                    "task failed, retrying"
                );
                state
                    .emit(Event::task_retrying(
                        state.run_id,
                        id.clone(),
                        attempts,
                        max_attempts,
                        err.to_string(),
                    ))
                    .await;
                sleep(retry_policy.get_delay()).await;
            }
            Err(err) => return Err(fail(err)),
        }
    }
}

fn check_outputs(outputs: &[Target]) -> Result<(), TaskError> {
    match outputs.iter().find(|t| !t.exists()) {
        Some(missing) => Err(TaskError::MissingOutput(missing.path().to_path_buf())),
        None => Ok(()),
    }
}

/// Remove every output of a failed attempt. A failed task leaves none of its
/// targets behind, so the next run executes it again.
fn discard_outputs(outputs: &[Target]) {
    for target in outputs.iter().filter(|t| t.exists()) {
        let path = target.path();
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "discarded output of failed attempt"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to discard output"),
        }
    }
}
