//! End-to-end pipeline tests: metadata, downloads, conversion and meshing.
//!
//! The converter is `sh` copying its input, so these tests only run on unix.

use crate::common::{Fixture, TILE_SIDE};
use lasmesh::pointcloud::sampled_len;
use lasmesh::testing::copy_converter;
use lasmesh::{
    Artifact, Executor, FetchError, MeshFormat, MeshStats, MeshType, SimplifyType, Task,
    TaskError, TaskStatus,
};

fn read_stats(path: &std::path::Path) -> MeshStats {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Test: a two-source product runs every task once and writes mesh and stats
#[tokio::test]
async fn test_create_mesh_two_sources() {
    let fixture = Fixture::new();
    let urls = fixture.publish_product("P1", &["a", "b"]);
    let pipeline = fixture.pipeline(copy_converter());
    let task = pipeline.create_mesh(pipeline.mesh_request("P1"));

    let report = Executor::new(4).run(task.clone()).await;

    assert!(report.success, "{:?}", report.failure);
    assert_eq!(report.completed_count(), 6);
    assert_eq!(report.task_statuses.len(), 6);
    for url in &urls {
        assert_eq!(fixture.fetcher.request_count(url), 1);
        let convert = pipeline.convert(url, &fixture.work_dir());
        assert_eq!(report.status(&convert.id()), Some(TaskStatus::Done));
        assert!(convert.output_path().is_file());
    }

    let stats = read_stats(&task.request().stat_path());
    let per_tile = sampled_len(TILE_SIDE * TILE_SIDE, 0.5);
    assert_eq!(stats.id, "P1");
    assert_eq!(stats.shape, [2 * per_tile, 4]);
    assert!(stats.average_distance > 0.0);

    let mesh = std::fs::read_to_string(task.request().mesh_path()).unwrap();
    assert!(mesh.starts_with("ply\n"));
    assert!(mesh.contains("element face"));
    assert_eq!(
        report
            .outputs
            .iter()
            .map(|t| t.path().to_path_buf())
            .collect::<Vec<_>>(),
        vec![task.request().mesh_path(), task.request().stat_path()]
    );
}

/// Test: OBJ output honours the requested file name
#[tokio::test]
async fn test_create_mesh_obj_with_filename() {
    let fixture = Fixture::new();
    fixture.publish_product("P2", &["a"]);
    let pipeline = fixture.pipeline(copy_converter());
    let mut request = pipeline.mesh_request("P2");
    request.file_format = MeshFormat::Obj;
    request.output_filename = Some("site.obj".to_string());
    let task = pipeline.create_mesh(request);

    let report = Executor::new(2).run(task.clone()).await;

    assert!(report.success, "{:?}", report.failure);
    let mesh_path = fixture.output_dir().join("site.obj");
    assert_eq!(task.request().mesh_path(), mesh_path);
    let mesh = std::fs::read_to_string(&mesh_path).unwrap();
    assert!(mesh.starts_with("# generated by lasmesh"));
    assert!(mesh.lines().any(|l| l.starts_with("v ")));
    assert!(fixture.output_dir().join("stat-P2.json").is_file());
}

/// Test: ball pivoting with quadric decimation completes
#[tokio::test]
async fn test_ball_pivoting_with_decimation() {
    let fixture = Fixture::new();
    fixture.publish_product("P3", &["a", "b"]);
    let pipeline = fixture.pipeline(copy_converter());
    let mut request = pipeline.mesh_request("P3");
    request.mesh_type = MeshType::BallPivoting;
    request.simplify_type = SimplifyType::QuadricDecimation;
    let task = pipeline.create_mesh(request);

    let report = Executor::new(4).run(task.clone()).await;

    assert!(report.success, "{:?}", report.failure);
    assert!(task.mesh_target().exists());
}

/// Test: vertex clustering terminates with a mesh or a geometry error
#[tokio::test]
async fn test_vertex_clustering_terminates() {
    let fixture = Fixture::new();
    fixture.publish_product("P4", &["a"]);
    let pipeline = fixture.pipeline(copy_converter());
    let mut request = pipeline.mesh_request("P4");
    request.simplify_type = SimplifyType::VertexClustering;
    let task = pipeline.create_mesh(request);

    let report = Executor::new(2).run(task.clone()).await;

    match &report.failure {
        None => assert_eq!(report.status(&task.id()), Some(TaskStatus::Done)),
        Some(failure) => assert!(matches!(failure.root_cause(), TaskError::Geometry(_))),
    }
}

/// Test: an unknown product fails at the metadata fetch without retries
#[tokio::test]
async fn test_missing_metadata_fails() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline(copy_converter());
    let task = pipeline.create_mesh(pipeline.mesh_request("NOPE"));

    let report = Executor::new(2).run(task.clone()).await;

    assert!(!report.success);
    let failure = report.failure.clone().unwrap();
    assert_eq!(failure.task.family(), "FetchMetadata");
    assert!(matches!(
        failure.root_cause(),
        TaskError::Fetch(FetchError::Status { status: 404, .. })
    ));
    assert_eq!(fixture.fetcher.request_count(&fixture.metadata_url("NOPE")), 1);
    assert_eq!(report.status(&task.id()), Some(TaskStatus::Failed));
    assert!(!task.stat_target().exists());
}

/// Test: a transient metadata failure is retried
#[tokio::test]
async fn test_transient_metadata_failure_is_retried() {
    let fixture = Fixture::new();
    fixture.publish_product("P5", &["a"]);
    let url = fixture.metadata_url("P5");
    fixture.fetcher.fail_next(url.clone(), 1);
    let pipeline = fixture.pipeline(copy_converter());
    let task = pipeline.fetch_metadata("P5", &fixture.work_dir());

    let report = Executor::new(1).run(task.clone()).await;

    assert!(report.success, "{:?}", report.failure);
    assert_eq!(fixture.fetcher.request_count(&url), 2);
    let stored = std::fs::read_to_string(task.path()).unwrap();
    assert!(stored.contains("sourceUrls"));
}
