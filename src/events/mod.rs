//! Lifecycle events and event handling.
//!
//! The executor emits an [`Event`] for every state change of a run and of
//! each task in it. Handlers registered on an [`EventBus`] observe them in
//! emission order.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::core::types::{RunId, TaskId};

/// Lifecycle events emitted during a run.
#[derive(Debug, Clone)]
pub enum Event {
    /// A run has started resolving its root task.
    RunStarted {
        run_id: RunId,
        root: TaskId,
        timestamp: Instant,
    },

    /// A task started executing (it holds a worker slot).
    TaskStarted {
        run_id: RunId,
        task_id: TaskId,
        timestamp: Instant,
    },

    /// A task was already complete and was not executed.
    TaskSkipped {
        run_id: RunId,
        task_id: TaskId,
        timestamp: Instant,
    },

    /// A running task suspended to wait for a batch of required tasks.
    TaskSuspended {
        run_id: RunId,
        task_id: TaskId,
        /// Number of tasks in the required batch.
        waiting_on: usize,
        timestamp: Instant,
    },

    /// A suspended task resumed after its batch became terminal.
    TaskResumed {
        run_id: RunId,
        task_id: TaskId,
        timestamp: Instant,
    },

    /// A task is being retried after failure.
    ///
    /// `max_attempts` is the total number of attempts including the initial
    /// one (`RetryPolicy.max_attempts + 1`).
    TaskRetrying {
        run_id: RunId,
        task_id: TaskId,
        /// The attempt number that just failed (1-indexed).
        attempt: u32,
        /// Total number of attempts that will be made, including the initial attempt.
        max_attempts: u32,
        error: String,
        timestamp: Instant,
    },

    /// A task completed successfully.
    TaskCompleted {
        run_id: RunId,
        task_id: TaskId,
        duration: Duration,
        timestamp: Instant,
    },

    /// A task failed with an error.
    TaskFailed {
        run_id: RunId,
        task_id: TaskId,
        error: String,
        timestamp: Instant,
    },

    /// A run finished (successfully or with a failure).
    RunCompleted {
        run_id: RunId,
        root: TaskId,
        success: bool,
        duration: Duration,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::RunStarted { timestamp, .. }
            | Event::TaskStarted { timestamp, .. }
            | Event::TaskSkipped { timestamp, .. }
            | Event::TaskSuspended { timestamp, .. }
            | Event::TaskResumed { timestamp, .. }
            | Event::TaskRetrying { timestamp, .. }
            | Event::TaskCompleted { timestamp, .. }
            | Event::TaskFailed { timestamp, .. }
            | Event::RunCompleted { timestamp, .. } => *timestamp,
        }
    }

    /// The task this event concerns, if it is a task event.
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            Event::TaskStarted { task_id, .. }
            | Event::TaskSkipped { task_id, .. }
            | Event::TaskSuspended { task_id, .. }
            | Event::TaskResumed { task_id, .. }
            | Event::TaskRetrying { task_id, .. }
            | Event::TaskCompleted { task_id, .. }
            | Event::TaskFailed { task_id, .. } => Some(task_id),
            Event::RunStarted { .. } | Event::RunCompleted { .. } => None,
        }
    }

    /// Create a RunStarted event.
    pub fn run_started(run_id: RunId, root: TaskId) -> Self {
        Event::RunStarted {
            run_id,
            root,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskStarted event.
    pub fn task_started(run_id: RunId, task_id: TaskId) -> Self {
        Event::TaskStarted {
            run_id,
            task_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskSkipped event.
    pub fn task_skipped(run_id: RunId, task_id: TaskId) -> Self {
        Event::TaskSkipped {
            run_id,
            task_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskSuspended event.
    pub fn task_suspended(run_id: RunId, task_id: TaskId, waiting_on: usize) -> Self {
        Event::TaskSuspended {
            run_id,
            task_id,
            waiting_on,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskResumed event.
    pub fn task_resumed(run_id: RunId, task_id: TaskId) -> Self {
        Event::TaskResumed {
            run_id,
            task_id,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskRetrying event.
    pub fn task_retrying(
        run_id: RunId,
        task_id: TaskId,
        attempt: u32,
        max_attempts: u32,
        error: String,
    ) -> Self {
        Event::TaskRetrying {
            run_id,
            task_id,
            attempt,
            max_attempts,
            error,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskCompleted event.
    pub fn task_completed(run_id: RunId, task_id: TaskId, duration: Duration) -> Self {
        Event::TaskCompleted {
            run_id,
            task_id,
            duration,
            timestamp: Instant::now(),
        }
    }

    /// Create a TaskFailed event.
    pub fn task_failed(run_id: RunId, task_id: TaskId, error: String) -> Self {
        Event::TaskFailed {
            run_id,
            task_id,
            error,
            timestamp: Instant::now(),
        }
    }

    /// Create a RunCompleted event.
    pub fn run_completed(run_id: RunId, root: TaskId, success: bool, duration: Duration) -> Self {
        Event::RunCompleted {
            run_id,
            root,
            success,
            duration,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingHandler;

    async fn recording_bus() -> (EventBus, Arc<RecordingHandler>) {
        let recorder = Arc::new(RecordingHandler::new());
        let bus = EventBus::new();
        bus.register(recorder.clone()).await;
        (bus, recorder)
    }

    #[tokio::test]
    async fn test_suspension_cycle_is_delivered_in_order() {
        let (bus, recorder) = recording_bus().await;
        let run = RunId::new();
        let mesh = TaskId::new("CreateMesh(product_id=P1)");

        bus.emit(Event::run_started(run, mesh.clone())).await;
        bus.emit(Event::task_started(run, mesh.clone())).await;
        bus.emit(Event::task_suspended(run, mesh.clone(), 2)).await;
        bus.emit(Event::task_resumed(run, mesh.clone())).await;
        bus.emit(Event::task_completed(run, mesh.clone(), Duration::from_millis(150)))
            .await;
        bus.emit(Event::run_completed(run, mesh.clone(), true, Duration::from_secs(1)))
            .await;

        let events = recorder.events().await;
        assert_eq!(events.len(), 6);
        assert!(matches!(&events[0], Event::RunStarted { root, .. } if *root == mesh));
        assert!(matches!(events[2], Event::TaskSuspended { waiting_on: 2, .. }));
        assert!(matches!(
            events[4],
            Event::TaskCompleted { duration, .. } if duration == Duration::from_millis(150)
        ));
        assert!(matches!(events[5], Event::RunCompleted { success: true, .. }));
        assert!(events.iter().all(|e| match e {
            Event::RunStarted { run_id, .. }
            | Event::TaskStarted { run_id, .. }
            | Event::TaskSuspended { run_id, .. }
            | Event::TaskResumed { run_id, .. }
            | Event::TaskCompleted { run_id, .. }
            | Event::RunCompleted { run_id, .. } => *run_id == run,
            _ => false,
        }));
    }

    #[tokio::test]
    async fn test_retry_event_carries_attempts() {
        let (bus, recorder) = recording_bus().await;

        bus.emit(Event::task_retrying(
            RunId::new(),
            TaskId::new("FetchBinary(url=memory://a.las)"),
            2,
            4,
            "connection reset".to_string(),
        ))
        .await;

        match &recorder.events().await[0] {
            Event::TaskRetrying {
                attempt,
                max_attempts,
                error,
                ..
            } => {
                assert_eq!((*attempt, *max_attempts), (2, 4));
                assert_eq!(error, "connection reset");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_task_id_accessor() {
        let run_id = RunId::new();

        assert_eq!(
            Event::task_skipped(run_id, TaskId::new("mesh"))
                .task_id()
                .map(TaskId::as_str),
            Some("mesh")
        );
        assert!(Event::run_started(run_id, TaskId::new("mesh")).task_id().is_none());
    }

    #[test]
    fn test_timestamp_is_taken_at_construction() {
        let before = Instant::now();
        let event = Event::task_failed(RunId::new(), TaskId::new("t"), "boom".to_string());

        assert!(event.timestamp() >= before);
        assert!(event.timestamp() <= Instant::now());
    }

    #[tokio::test]
    async fn test_every_handler_sees_each_event() {
        let (bus, first) = recording_bus().await;
        let second = Arc::new(RecordingHandler::new());
        bus.register(second.clone()).await;

        bus.emit(Event::task_skipped(RunId::new(), TaskId::new("t"))).await;

        assert_eq!(bus.handler_count().await, 2);
        assert_eq!(first.events().await.len(), 1);
        assert_eq!(second.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_emit_without_handlers() {
        EventBus::new()
            .emit(Event::run_started(RunId::new(), TaskId::new("t")))
            .await;
    }
}
