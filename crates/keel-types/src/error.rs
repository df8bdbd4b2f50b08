//! Descriptor error types

use thiserror::Error;

/// Errors raised while loading or validating a deployment descriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Failed to parse descriptor: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Duplicate instance group: {0}")]
    DuplicateInstanceGroup(String),

    #[error("Duplicate job {job} in instance group {instance_group}")]
    DuplicateJob { instance_group: String, job: String },

    #[error("Job {job} in instance group {instance_group} references undeclared release {release}")]
    UndeclaredRelease {
        instance_group: String,
        job: String,
        release: String,
    },

    #[error("Add-on {addon} job {job} references undeclared release {release}")]
    UndeclaredAddonRelease {
        addon: String,
        job: String,
        release: String,
    },

    #[error("Invalid property {path} on job {job}: {reason}")]
    InvalidProperty {
        job: String,
        path: String,
        reason: String,
    },
}

/// Result type for descriptor operations
pub type Result<T> = std::result::Result<T, DescriptorError>;
