//! Resolver error types

use crate::addon::OsLookupError;
use crate::hooks::HookError;
use crate::pipeline::Stage;
use crate::provider::ProviderError;
use thiserror::Error;

/// Category of a resolution failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ReleaseLookupFailure,
    AddonMatchFailure,
    LinkResolutionFailure,
    TemplateLookupFailure,
    RenderFailure,
    MergeFailure,
    AddressingFailure,
    HookFailure,
    InstanceGroupNotFound,
}

/// Errors raised by a single resolution step
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Release lookup failed for job {job} of release {release}: {source}")]
    ReleaseLookup {
        release: String,
        job: String,
        #[source]
        source: ProviderError,
    },

    #[error("Add-on {addon} could not be matched against instance group {instance_group}: {source}")]
    AddonMatch {
        addon: String,
        instance_group: String,
        #[source]
        source: OsLookupError,
    },

    #[error("Job {job} in instance group {instance_group} consumes link {link} of type {link_type}, but nothing provides it")]
    MissingLink {
        instance_group: String,
        job: String,
        link: String,
        link_type: String,
    },

    #[error("Job {job} in instance group {instance_group} provides link {link} of type {link_type}, which is already provided")]
    DuplicateProvider {
        instance_group: String,
        job: String,
        link: String,
        link_type: String,
    },

    #[error("Job {job} of release {release} has no template rendering to {destination} and no process config override")]
    TemplateLookup {
        job: String,
        release: String,
        destination: String,
    },

    #[error("Rendering template {template} of job {job} for instance {index} failed: {reason}")]
    Render {
        job: String,
        template: String,
        index: usize,
        reason: String,
    },

    #[error("Invalid process config override on job {job}: {reason}")]
    Merge { job: String, reason: String },

    #[error("Cannot address job {job} in instance group {instance_group}: {reason}")]
    Addressing {
        instance_group: String,
        job: String,
        reason: String,
    },

    #[error("Pre-render hook of job {job} in instance group {instance_group} failed: {source}")]
    Hook {
        instance_group: String,
        job: String,
        #[source]
        source: HookError,
    },

    #[error("Instance group not found: {0}")]
    InstanceGroupNotFound(String),
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::ReleaseLookup { .. } => ErrorKind::ReleaseLookupFailure,
            ResolveError::AddonMatch { .. } => ErrorKind::AddonMatchFailure,
            ResolveError::MissingLink { .. } | ResolveError::DuplicateProvider { .. } => {
                ErrorKind::LinkResolutionFailure
            }
            ResolveError::TemplateLookup { .. } => ErrorKind::TemplateLookupFailure,
            ResolveError::Render { .. } => ErrorKind::RenderFailure,
            ResolveError::Merge { .. } => ErrorKind::MergeFailure,
            ResolveError::Addressing { .. } => ErrorKind::AddressingFailure,
            ResolveError::Hook { .. } => ErrorKind::HookFailure,
            ResolveError::InstanceGroupNotFound(_) => ErrorKind::InstanceGroupNotFound,
        }
    }
}

/// A failed pipeline run for one instance group
#[derive(Debug, Error)]
#[error("Stage {stage} failed for instance group {instance_group}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub instance_group: String,
    #[source]
    pub source: ResolveError,
}

impl PipelineError {
    pub fn new(stage: Stage, instance_group: impl Into<String>, source: ResolveError) -> Self {
        Self {
            stage,
            instance_group: instance_group.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Errors raised while assembling a pipeline
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{0} required")]
    MissingComponent(&'static str),
}

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, ResolveError>;
