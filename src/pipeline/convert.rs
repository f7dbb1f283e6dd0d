//! Point format normalisation through an external program.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::download::FetchBinary;
use crate::config::ConverterConfig;
use crate::core::context::TaskContext;
use crate::core::target::{Artifact, BinaryTarget, Target};
use crate::core::task::{Task, TaskError};
use crate::core::types::Params;
use crate::execution::ExternalCommand;

/// Rewrites a downloaded point file into the configured format version.
///
/// The converter writes straight into the staging file of the output target,
/// so a failed or interrupted conversion never leaves a converted file behind.
pub struct ConvertPointFormat {
    source: Arc<FetchBinary>,
    output_path: PathBuf,
    converter: ConverterConfig,
}

impl ConvertPointFormat {
    pub fn new(
        source: Arc<FetchBinary>,
        output_path: impl Into<PathBuf>,
        converter: ConverterConfig,
    ) -> Self {
        Self {
            source,
            output_path: output_path.into(),
            converter,
        }
    }

    pub fn input_path(&self) -> &Path {
        self.source.path()
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Build the converter invocation for `input` writing to `output`.
    pub fn command(&self, input: &Path, output: &Path) -> ExternalCommand {
        let input = input.display().to_string();
        let output = output.display().to_string();
        let args = self.converter.args.iter().map(|arg| {
            arg.replace("{input}", &input)
                .replace("{output}", &output)
                .replace("{version}", &self.converter.version)
        });

        let mut builder = ExternalCommand::builder(&self.converter.program).args(args);
        if let Some(secs) = self.converter.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder.build()
    }
}

#[async_trait]
impl Task for ConvertPointFormat {
    fn family(&self) -> &'static str {
        "ConvertPointFormat"
    }

    fn params(&self) -> Params {
        Params::new()
            .with("input_path", self.input_path().display())
            .with("output_path", self.output_path.display())
    }

    fn dependencies(&self) -> Vec<Arc<dyn Task>> {
        vec![self.source.clone() as Arc<dyn Task>]
    }

    fn outputs(&self) -> Vec<Target> {
        vec![Target::binary(&self.output_path)]
    }

    async fn execute(&self, ctx: &mut TaskContext) -> Result<(), TaskError> {
        let input = ctx
            .input(0)?
            .first()
            .map(|t| t.path().to_path_buf())
            .ok_or_else(|| TaskError::MissingOutput(self.input_path().to_path_buf()))?;

        let writer = BinaryTarget::new(&self.output_path).open_write()?;
        let command = self.command(&input, writer.staging_path());
        debug!(program = command.program(), args = ?command.args(), "Running converter");

        let output = command.run_checked().await?;
        if !output.stderr.trim().is_empty() {
            debug!(stderr = %output.stderr.trim(), "Converter diagnostics");
        }

        let written = std::fs::metadata(writer.staging_path())
            .map(|m| m.len())
            .unwrap_or(0);
        if written == 0 {
            return Err(TaskError::MissingOutput(self.output_path.clone()));
        }

        writer.commit()?;
        info!(
            input = %input.display(),
            output = %self.output_path.display(),
            bytes = written,
            "Converted point file"
        );
        Ok(())
    }

    fn description(&self) -> Option<&str> {
        Some("Normalise a point file with the external converter")
    }
}
