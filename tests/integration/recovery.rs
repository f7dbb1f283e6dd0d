//! Recovery tests: failed runs resume from committed artifacts and completed
//! runs are not repeated.

use crate::common::{Fixture, snapshot};
use lasmesh::testing::{converter_failing_on, copy_converter};
use lasmesh::{Artifact, Executor, NativeGeometry, Pipeline, Task, TaskError, TaskStatus};
use std::sync::Arc;

/// Test: a failed conversion leaves the other sources intact, and a rerun
/// only does the missing work
#[tokio::test]
async fn test_rerun_after_failed_conversion() {
    let fixture = Fixture::new();
    let urls = fixture.publish_product("P1", &["a", "b"]);
    let (url_a, url_b) = (&urls[0], &urls[1]);

    let broken = fixture.pipeline(converter_failing_on("b.las"));
    let task = broken.create_mesh(broken.mesh_request("P1"));
    let report = Executor::new(4).run(task.clone()).await;

    assert!(!report.success);
    let failure = report.failure.clone().unwrap();
    let convert_b = broken.convert(url_b, &fixture.work_dir());
    assert_eq!(failure.task, convert_b.id());
    match failure.root_cause() {
        TaskError::Conversion { code, stderr } => {
            assert_eq!(*code, 3);
            assert!(stderr.contains("corrupt input"));
        }
        other => panic!("unexpected root cause: {other:?}"),
    }
    let convert_a = broken.convert(url_a, &fixture.work_dir());
    assert!(convert_a.output_path().is_file());
    assert!(!convert_b.output_path().exists());
    assert!(!task.mesh_target().exists());
    let requests_after_failure = fixture.fetcher.total_requests();

    let fixed = fixture.pipeline(copy_converter());
    let task = fixed.create_mesh(fixed.mesh_request("P1"));
    let report = Executor::new(4).run(task.clone()).await;

    assert!(report.success, "{:?}", report.failure);
    assert_eq!(report.executed_tasks(), vec![convert_b.id(), task.id()]);
    assert_eq!(report.status(&convert_a.id()), Some(TaskStatus::Skipped));
    assert_eq!(fixture.fetcher.total_requests(), requests_after_failure);
    assert!(task.mesh_target().exists());
}

/// Test: a second run executes nothing and leaves every artifact untouched
#[tokio::test]
async fn test_second_run_is_idempotent() {
    let fixture = Fixture::new();
    fixture.publish_product("P1", &["a", "b"]);
    let pipeline = fixture.pipeline(copy_converter());
    let task = pipeline.create_mesh(pipeline.mesh_request("P1"));
    let executor = Executor::new(4);

    let first = executor.run(task.clone()).await;
    assert!(first.success, "{:?}", first.failure);
    let before = snapshot(fixture.dir.path());
    let requests = fixture.fetcher.total_requests();

    let second = executor.run(task.clone()).await;

    assert!(second.success);
    assert!(second.executed_tasks().is_empty());
    assert_eq!(second.status(&task.id()), Some(TaskStatus::Skipped));
    assert_eq!(snapshot(fixture.dir.path()), before);
    assert_eq!(fixture.fetcher.total_requests(), requests);
}

/// Test: a staging file left by an interrupted run does not count as an
/// artifact
#[tokio::test]
async fn test_staging_leftover_is_not_an_artifact() {
    let fixture = Fixture::new();
    let urls = fixture.publish_product("P1", &["a"]);
    let pipeline = fixture.pipeline(copy_converter());
    let download = pipeline.fetch_binary(&urls[0], &fixture.work_dir());
    let name = download.path().file_name().unwrap().to_string_lossy();
    std::fs::create_dir_all(fixture.work_dir()).unwrap();
    std::fs::write(
        fixture.work_dir().join(format!(".{name}.interrupted.tmp")),
        b"half",
    )
    .unwrap();

    let report = Executor::new(1).run(download.clone()).await;

    assert!(report.success, "{:?}", report.failure);
    assert_eq!(report.status(&download.id()), Some(TaskStatus::Done));
    assert_eq!(fixture.fetcher.request_count(&urls[0]), 1);
    assert!(std::fs::read(download.path()).unwrap().starts_with(b"LASF"));
}

/// Test: when reconstruction fails after the stat file was committed, neither
/// output survives and a rerun builds both
#[tokio::test]
async fn test_failed_reconstruction_discards_stats() {
    let fixture = Fixture::new();
    fixture.publish_product("P1", &["a"]);
    let mut config = fixture.config(copy_converter());
    config.reconstruction.poisson_depth = 0;
    let broken = Pipeline::new(config, fixture.fetcher.clone(), Arc::new(NativeGeometry));
    let task = broken.create_mesh(broken.mesh_request("P1"));

    let report = Executor::new(2).run(task.clone()).await;

    assert!(!report.success);
    assert!(matches!(
        report.failure.clone().unwrap().root_cause(),
        TaskError::Geometry(_)
    ));
    assert!(!task.stat_target().exists());
    assert!(!task.mesh_target().exists());

    let fixed = fixture.pipeline(copy_converter());
    let task = fixed.create_mesh(fixed.mesh_request("P1"));
    let report = Executor::new(2).run(task.clone()).await;

    assert!(report.success, "{:?}", report.failure);
    assert_eq!(report.status(&task.id()), Some(TaskStatus::Done));
    assert!(task.stat_target().exists());
    assert!(task.mesh_target().exists());
}
