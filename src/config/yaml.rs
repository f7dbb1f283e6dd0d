//! YAML configuration parsing.
//!
//! Every key is optional; missing keys take the built-in defaults.
//!
//! ```yaml
//! work_dir: data/work
//! output_dir: data/mesh
//! file_format: obj
//! sampling_rate: 0.25
//! converter:
//!   program: las2las
//!   args: ["-f", "{version}", "{input}", "{output}"]
//! fetch_retry:
//!   max_attempts: 5
//!   delay_ms: 2000
//!   retry_on: transient_only
//! ```

use std::path::Path;

use super::error::ConfigError;
use super::types::PipelineConfig;

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load pipeline configuration from a file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<PipelineConfig, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: PipelineConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlFileError {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Parse pipeline configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<PipelineConfig, ConfigError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a pipeline configuration.
    pub fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
        if !config.metadata_url_template.contains("{product_id}") {
            return Err(ConfigError::InvalidConfig(
                "metadata_url_template must contain {product_id}".into(),
            ));
        }

        if !(config.sampling_rate > 0.0 && config.sampling_rate <= 1.0) {
            return Err(ConfigError::InvalidConfig(format!(
                "sampling_rate must be in (0, 1], got {}",
                config.sampling_rate
            )));
        }

        if config.max_workers == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_workers cannot be zero".into(),
            ));
        }

        if config.converter.program.trim().is_empty() {
            return Err(ConfigError::MissingField("converter.program".into()));
        }

        let params = &config.reconstruction;
        let multipliers = [
            ("voxel_multiplier", params.voxel_multiplier),
            ("clustering_multiplier", params.clustering_multiplier),
            ("decimation_ratio", params.decimation_ratio),
        ];
        for (name, value) in multipliers {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidConfig(format!(
                    "reconstruction.{name} must be positive, got {value}"
                )));
            }
        }

        if params.normal_max_neighbors == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconstruction.normal_max_neighbors cannot be zero".into(),
            ));
        }

        if params.ball_pivoting_radii.is_empty()
            || params.ball_pivoting_radii.iter().any(|r| *r <= 0.0)
        {
            return Err(ConfigError::InvalidConfig(
                "reconstruction.ball_pivoting_radii must be a non-empty list of positive values"
                    .into(),
            ));
        }

        Ok(())
    }
}
