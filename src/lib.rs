//! lasmesh - a resumable task engine that turns surveyed LAS point clouds into
//! surface meshes.
//!
//! Work is expressed as [`Task`]s identified by family and parameters. Each
//! task names the [`Target`]s it produces; the [`Executor`] skips tasks whose
//! targets already exist, runs the rest on a bounded worker pool, and lets a
//! running task [`require`](TaskContext::require) further tasks it only
//! discovers while running.
//!
//! The [`pipeline`] module provides the mesh-building task set on top of the
//! engine.

pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod geometry;
pub mod pipeline;
pub mod pointcloud;
pub mod testing;

pub use config::{ConfigError, MeshType, PipelineConfig, SimplifyType, YamlLoader};
pub use core::context::TaskContext;
pub use core::retry::{RetryCondition, RetryPolicy};
pub use core::target::{Artifact, AtomicWriter, BinaryTarget, Target, TargetKind, TextTarget};
pub use core::task::{Task, TaskError, TaskFailure};
pub use core::types::{Params, RunId, TaskId};
pub use events::{Event, EventBus, EventHandler};
pub use execution::{CommandOutput, Executor, ExternalCommand, RunReport, TaskStatus};
pub use geometry::{Geometry, GeometryError, MeshFormat, NativeGeometry};
pub use pipeline::{
    ConvertPointFormat, CreateMesh, FetchBinary, FetchError, FetchMetadata, Fetcher, HttpFetcher,
    MeshRequest, MeshStats, Pipeline, ProductMetadata,
};
