//! Engine tests driven through the public task API.

use async_trait::async_trait;
use lasmesh::testing::RecordingHandler;
use lasmesh::{
    Artifact, Event, EventBus, Executor, Params, Target, Task, TaskContext, TaskError,
    TaskStatus, TextTarget,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Writes its own name to `<dir>/<name>.txt`.
struct Leaf {
    dir: PathBuf,
    name: String,
}

impl Leaf {
    fn new(dir: &Path, name: impl Into<String>) -> Arc<dyn Task> {
        Arc::new(Self {
            dir: dir.to_path_buf(),
            name: name.into(),
        })
    }

    fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.txt", self.name))
    }
}

#[async_trait]
impl Task for Leaf {
    fn family(&self) -> &'static str {
        "Leaf"
    }

    fn params(&self) -> Params {
        Params::new()
            .with("dir", self.dir.display())
            .with("name", &self.name)
    }

    fn outputs(&self) -> Vec<Target> {
        vec![Target::text(self.path())]
    }

    async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
        TextTarget::new(self.path()).write_string(&self.name)
    }
}

/// Discovers `width` leaves while running and joins their contents.
struct Gather {
    dir: PathBuf,
    width: usize,
}

#[async_trait]
impl Task for Gather {
    fn family(&self) -> &'static str {
        "Gather"
    }

    fn params(&self) -> Params {
        Params::new()
            .with("dir", self.dir.display())
            .with("width", self.width)
    }

    fn outputs(&self) -> Vec<Target> {
        vec![Target::text(self.dir.join("gather.txt"))]
    }

    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        let leaves = (0..self.width)
            .map(|i| Leaf::new(&self.dir, format!("leaf-{i}")))
            .collect();
        let resolved = ctx.require(leaves).await?;

        let mut names = Vec::with_capacity(resolved.len());
        for targets in &resolved {
            let text = targets[0]
                .as_text()
                .ok_or_else(|| TaskError::Decode("expected a text target".to_string()))?;
            names.push(text.read_string()?);
        }
        TextTarget::new(self.dir.join("gather.txt")).write_string(&names.join(","))
    }
}

/// Requires `Chain(next)` when `next` is set.
struct Chain {
    dir: PathBuf,
    name: &'static str,
    next: Option<&'static str>,
}

#[async_trait]
impl Task for Chain {
    fn family(&self) -> &'static str {
        "Chain"
    }

    fn params(&self) -> Params {
        Params::new().with("name", self.name)
    }

    fn outputs(&self) -> Vec<Target> {
        vec![Target::text(self.dir.join(format!("{}.txt", self.name)))]
    }

    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        if let Some(next) = self.next {
            ctx.require_one(Arc::new(Chain {
                dir: self.dir.clone(),
                name: next,
                next: Some(self.name),
            }))
            .await?;
        }
        TextTarget::new(self.dir.join(format!("{}.txt", self.name))).write_string(self.name)
    }
}

/// Distinct identities that share one output location.
struct Claimant {
    path: PathBuf,
    tag: &'static str,
}

#[async_trait]
impl Task for Claimant {
    fn family(&self) -> &'static str {
        "Claimant"
    }

    fn params(&self) -> Params {
        Params::new().with("tag", self.tag)
    }

    fn outputs(&self) -> Vec<Target> {
        vec![Target::text(&self.path)]
    }

    async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
        TextTarget::new(&self.path).write_string(self.tag)
    }
}

struct Pair {
    dir: PathBuf,
}

#[async_trait]
impl Task for Pair {
    fn family(&self) -> &'static str {
        "Pair"
    }

    fn params(&self) -> Params {
        Params::new().with("dir", self.dir.display())
    }

    fn dependencies(&self) -> Vec<Arc<dyn Task>> {
        let shared = self.dir.join("shared.txt");
        vec![
            Arc::new(Claimant {
                path: shared.clone(),
                tag: "first",
            }),
            Arc::new(Claimant {
                path: shared,
                tag: "second",
            }),
        ]
    }

    fn outputs(&self) -> Vec<Target> {
        vec![Target::text(self.dir.join("pair.txt"))]
    }

    async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
        TextTarget::new(self.dir.join("pair.txt")).write_string("pair")
    }
}

/// Test: a fan-out wider than the worker pool completes with one worker
#[tokio::test]
async fn test_fan_out_wider_than_pool() {
    let dir = TempDir::new().unwrap();
    let root = Arc::new(Gather {
        dir: dir.path().to_path_buf(),
        width: 8,
    });

    let report = Executor::new(1).run(root.clone()).await;

    assert!(report.success, "{:?}", report.failure);
    assert_eq!(report.completed_count(), 9);
    let joined = std::fs::read_to_string(dir.path().join("gather.txt")).unwrap();
    let expected: Vec<String> = (0..8).map(|i| format!("leaf-{i}")).collect();
    assert_eq!(joined, expected.join(","));
}

/// Test: a second run of a completed graph executes nothing
#[tokio::test]
async fn test_completed_graph_is_skipped() {
    let dir = TempDir::new().unwrap();
    let root = Arc::new(Gather {
        dir: dir.path().to_path_buf(),
        width: 3,
    });
    let executor = Executor::new(2);
    executor.run(root.clone()).await;

    let report = executor.run(root.clone()).await;

    assert!(report.success);
    assert_eq!(report.completed_count(), 0);
    assert_eq!(report.status(&root.id()), Some(TaskStatus::Skipped));
    assert_eq!(report.task_statuses.len(), 1);
}

/// Test: two tasks requiring each other fail with a cycle instead of hanging
#[tokio::test]
async fn test_dynamic_cycle_is_reported() {
    let dir = TempDir::new().unwrap();
    let root = Arc::new(Chain {
        dir: dir.path().to_path_buf(),
        name: "a",
        next: Some("b"),
    });

    let executor = Executor::new(2);
    let report = tokio::time::timeout(std::time::Duration::from_secs(10), executor.run(root))
        .await
        .expect("cycle must not deadlock");

    assert!(!report.success);
    let failure = report.failure.clone().unwrap();
    assert!(matches!(failure.root_cause(), TaskError::DependencyCycle(_)));
    assert!(!dir.path().join("a.txt").exists());
}

/// Test: distinct tasks claiming one output location are rejected
#[tokio::test]
async fn test_output_collision_is_rejected() {
    let dir = TempDir::new().unwrap();
    let root = Arc::new(Pair {
        dir: dir.path().to_path_buf(),
    });

    let report = Executor::new(2).run(root).await;

    assert!(!report.success);
    assert!(matches!(
        report.failure.clone().unwrap().root_cause(),
        TaskError::IdentityCollision { .. }
    ));
    assert!(!dir.path().join("pair.txt").exists());
}

/// Test: lifecycle events bracket the run
#[tokio::test]
async fn test_events_bracket_run() {
    let dir = TempDir::new().unwrap();
    let recorder = Arc::new(RecordingHandler::new());
    let bus = Arc::new(EventBus::new());
    bus.register(recorder.clone()).await;
    let executor = Executor::new(2).with_event_bus(bus);

    let report = executor.run(Leaf::new(dir.path(), "solo")).await;

    assert!(report.success);
    let events = recorder.events().await;
    assert!(matches!(events.first(), Some(Event::RunStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(Event::RunCompleted { success: true, .. })
    ));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, Event::TaskCompleted { .. }))
    );
    assert!(report.outputs[0].exists());
}

/// Test: an abandoned staged write leaves nothing behind
#[test]
fn test_abandoned_write_leaves_no_artifact() {
    use std::io::Write;

    let dir = TempDir::new().unwrap();
    let target = Target::binary(dir.path().join("out.bin"));

    let mut writer = target.open_write().unwrap();
    writer.write_all(b"partial").unwrap();
    drop(writer);

    assert!(!target.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
