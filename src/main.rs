//! lasmesh - build surface meshes from surveyed LAS point clouds.
//!
//! Usage:
//!   lasmesh create-mesh --product-id ID     Fetch, convert and mesh a product
//!   lasmesh fetch-metadata --product-id ID  Only fetch a product's metadata
//!
//! Completed artifacts are reused, so an interrupted or failed run can simply
//! be started again.

use clap::{Parser, Subcommand};
use lasmesh::{
    Artifact, Event, EventBus, EventHandler, Executor, HttpFetcher, MeshFormat, MeshType,
    NativeGeometry, Pipeline, PipelineConfig, SimplifyType, Task, YamlLoader,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// lasmesh - build surface meshes from surveyed LAS point clouds
#[derive(Parser)]
#[command(name = "lasmesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum number of concurrently running tasks
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the mesh and stat file of a product
    CreateMesh {
        /// Product identifier
        #[arg(long)]
        product_id: String,

        /// Directory for the mesh and stat files
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Mesh file name (default: mesh-<product-id>.<format>)
        #[arg(long)]
        output_filename: Option<String>,

        /// Directory for downloaded and converted files
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Mesh file format: ply or obj
        #[arg(long)]
        file_format: Option<MeshFormat>,

        /// Reconstruction: poisson or ball-pivoting
        #[arg(long)]
        mesh_type: Option<MeshType>,

        /// Simplification: none, quadric-decimation or vertex-clustering
        #[arg(long)]
        simplify_type: Option<SimplifyType>,
    },

    /// Fetch and store the metadata of a product
    FetchMetadata {
        /// Product identifier
        #[arg(long)]
        product_id: String,

        /// Directory for the metadata file
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },
}

/// Event handler that logs task lifecycle events.
struct LoggingHandler;

#[async_trait::async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &Event) {
        match event {
            Event::RunStarted { run_id, root, .. } => {
                info!("Run {} started for {}", run_id, root);
            }
            Event::TaskStarted { task_id, .. } => {
                info!("  Task '{}' started", task_id);
            }
            Event::TaskSkipped { task_id, .. } => {
                info!("  Task '{}' already complete", task_id);
            }
            Event::TaskSuspended {
                task_id,
                waiting_on,
                ..
            } => {
                debug!("  Task '{}' waiting on {} task(s)", task_id, waiting_on);
            }
            Event::TaskResumed { task_id, .. } => {
                debug!("  Task '{}' resumed", task_id);
            }
            Event::TaskRetrying {
                task_id,
                attempt,
                max_attempts,
                error,
                ..
            } => {
                warn!(
                    "  Task '{}' attempt {}/{} failed, retrying: {}",
                    task_id, attempt, max_attempts, error
                );
            }
            Event::TaskCompleted {
                task_id, duration, ..
            } => {
                info!("  Task '{}' completed in {:?}", task_id, duration);
            }
            Event::TaskFailed { task_id, error, .. } => {
                warn!("  Task '{}' failed: {}", task_id, error);
            }
            Event::RunCompleted {
                run_id,
                success,
                duration,
                ..
            } => {
                if *success {
                    info!("Run {} completed successfully in {:?}", run_id, duration);
                } else {
                    error!("Run {} failed after {:?}", run_id, duration);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            YamlLoader::load_file(path)?
        }
        None => PipelineConfig::default(),
    };
    if let Some(workers) = cli.workers {
        config.max_workers = workers;
    }
    YamlLoader::validate(&config)?;

    let executor = Executor::new(config.max_workers).with_event_bus(event_bus().await);
    let pipeline = Pipeline::new(
        config,
        Arc::new(HttpFetcher::new()?),
        Arc::new(NativeGeometry::new()),
    );

    let task: Arc<dyn Task> = match cli.command {
        Commands::CreateMesh {
            product_id,
            output_dir,
            output_filename,
            work_dir,
            file_format,
            mesh_type,
            simplify_type,
        } => {
            let mut request = pipeline.mesh_request(&product_id);
            if let Some(dir) = output_dir {
                request.output_dir = dir;
            }
            if let Some(dir) = work_dir {
                request.work_dir = dir;
            }
            request.output_filename = output_filename;
            request.file_format = file_format.unwrap_or(request.file_format);
            request.mesh_type = mesh_type.unwrap_or(request.mesh_type);
            request.simplify_type = simplify_type.unwrap_or(request.simplify_type);
            pipeline.create_mesh(request)
        }
        Commands::FetchMetadata {
            product_id,
            work_dir,
        } => {
            let work_dir = work_dir.unwrap_or_else(|| pipeline.config().work_dir.clone());
            pipeline.fetch_metadata(&product_id, &work_dir)
        }
    };

    let report = executor.run(task).await;

    match &report.failure {
        None => {
            for output in &report.outputs {
                println!("{}", output.path().display());
            }
            info!(
                "{} task(s) executed, {} already complete",
                report.completed_count(),
                report.skipped_count()
            );
            Ok(ExitCode::SUCCESS)
        }
        Some(failure) => {
            error!("Task '{}' failed: {}", failure.task, failure.root_cause());
            eprintln!("task {} failed: {}", failure.task, failure.root_cause());
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Event bus with the logging handler registered.
async fn event_bus() -> Arc<EventBus> {
    let bus = Arc::new(EventBus::new());
    bus.register(Arc::new(LoggingHandler)).await;
    bus
}
