//! CLI error types

use keel_resolver::{BuildError, PipelineError, ResolveError};
use keel_types::DescriptorError;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Descriptor could not be loaded
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    /// Resolution pipeline failed
    #[error("Resolution failed: {0}")]
    Pipeline(#[from] PipelineError),

    /// Resolution step failed outside a pipeline run
    #[error("Resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// Pipeline could not be assembled
    #[error("Pipeline setup error: {0}")]
    Build(#[from] BuildError),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Background resolution task failed
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
