//! Task trait and error types.
//!
//! The `Task` trait is the fundamental unit of work in the engine. A task is
//! identified by its family and parameters, names the targets it produces,
//! declares static dependencies, and may require further tasks while it runs.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use super::context::TaskContext;
use super::retry::RetryPolicy;
use super::target::Target;
use super::types::{Params, TaskId};
use crate::geometry::GeometryError;
use crate::pipeline::FetchError;

/// Errors that can occur during task resolution and execution.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Fetching a remote resource failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Content could not be decoded or parsed.
    #[error("decode error: {0}")]
    Decode(String),

    /// The external format normalizer exited unsuccessfully.
    #[error("conversion failed: command exited with code {code}: {stderr}")]
    Conversion { code: i32, stderr: String },

    /// A waits-on edge closed a cycle.
    #[error("dependency cycle: {}", render_cycle(.0))]
    DependencyCycle(Vec<TaskId>),

    /// Two distinct identities resolved to the same target location.
    #[error("identity collision at '{}': {first} and {second}", .location.display())]
    IdentityCollision {
        location: PathBuf,
        first: TaskId,
        second: TaskId,
    },

    /// The geometry collaborator failed.
    #[error("geometry operation failed: {0}")]
    Geometry(#[from] GeometryError),

    /// A target exists but is not a complete artifact.
    #[error("partial artifact at '{}'", .0.display())]
    PartialArtifact(PathBuf),

    /// A task reported success without producing one of its targets.
    #[error("task finished without producing '{}'", .0.display())]
    MissingOutput(PathBuf),

    /// Filesystem access failed.
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Task timed out.
    #[error("task timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Task execution failed with a message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// A required task failed.
    #[error(transparent)]
    Upstream(TaskFailure),
}

fn render_cycle(path: &[TaskId]) -> String {
    path.iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl TaskError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Io {
            path: path.into(),
            source,
        }
    }

    /// Check if this error is considered transient (should trigger retry).
    pub fn is_transient(&self) -> bool {
        match self {
            TaskError::Fetch(e) => e.is_transient(),
            TaskError::Timeout(_) => true,
            _ => false,
        }
    }

    /// The originating error, looking through upstream failures.
    pub fn root_cause(&self) -> &TaskError {
        match self {
            TaskError::Upstream(failure) => failure.error.root_cause(),
            other => other,
        }
    }
}

/// A task failure as recorded by the executor.
///
/// Failures are shared between every requester of the failed task, so the
/// error is reference counted.
#[derive(Debug, Clone, Error)]
#[error("task {task} failed: {error}")]
pub struct TaskFailure {
    /// Identity of the task the error originated in.
    pub task: TaskId,
    /// The originating error.
    pub error: Arc<TaskError>,
}

impl TaskFailure {
    /// Create a failure for a task.
    pub fn new(task: TaskId, error: TaskError) -> Self {
        Self {
            task,
            error: Arc::new(error),
        }
    }

    /// The originating error, looking through upstream failures.
    pub fn root_cause(&self) -> &TaskError {
        self.error.root_cause()
    }
}

/// The core trait for defining idempotent units of work.
///
/// # Example
///
/// ```ignore
/// use lasmesh::{Params, Target, Task, TaskContext, TaskError, TextTarget};
/// use async_trait::async_trait;
///
/// struct Greeting {
///     path: std::path::PathBuf,
/// }
///
/// #[async_trait]
/// impl Task for Greeting {
///     fn family(&self) -> &'static str {
///         "Greeting"
///     }
///
///     fn params(&self) -> Params {
///         Params::new().with("path", self.path.display())
///     }
///
///     fn outputs(&self) -> Vec<Target> {
///         vec![Target::text(&self.path)]
///     }
///
///     async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
///         TextTarget::new(&self.path).write_string("hello")
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    /// Name of the task type. Together with [`params`](Self::params) it
    /// determines identity.
    fn family(&self) -> &'static str;

    /// The immutable parameters of this instance.
    fn params(&self) -> Params;

    /// Canonical identity of this task.
    fn id(&self) -> TaskId {
        TaskId::from_parts(self.family(), &self.params())
    }

    /// Statically known prerequisites.
    ///
    /// Default implementation returns no dependencies.
    fn dependencies(&self) -> Vec<Arc<dyn Task>> {
        Vec::new()
    }

    /// Targets this task is responsible for producing.
    fn outputs(&self) -> Vec<Target>;

    /// Perform the work.
    ///
    /// # Arguments
    /// * `ctx` - Resolved static inputs and the `require` entry point for
    ///   dependencies discovered while running
    ///
    /// # Returns
    /// * `Ok(())` - Task completed; every output must now exist
    /// * `Err(TaskError)` - Task failed
    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskError>;

    /// Returns the retry policy for this task.
    ///
    /// Default implementation returns no retries.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Optional description for display/logging purposes.
    fn description(&self) -> Option<&str> {
        None
    }
}
