//! Configuration loading and parsing.
//!
//! This module provides YAML-based configuration for the mesh pipeline.

mod error;
mod types;
mod yaml;

pub use error::ConfigError;
pub use types::{
    ConverterConfig, DEFAULT_METADATA_URL_TEMPLATE, MeshType, PipelineConfig,
    ReconstructionParams, SimplifyType,
};
pub use yaml::YamlLoader;
