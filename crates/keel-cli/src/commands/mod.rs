//! CLI command implementations

pub mod addons;
pub mod instances;
pub mod links;
pub mod resolve;

use crate::error::{CliError, CliResult};
use crate::render::HandlebarsRenderer;
use keel_resolver::{
    CommandHookRunner, DirectoryReleaseSpecProvider, Pipeline, PipelineBuilder, ResolverConfig,
};
use keel_types::Manifest;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Settings shared by every command
#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    /// Release source directory
    pub releases_dir: PathBuf,

    pub resolver: ResolverConfig,
}

impl Workspace {
    /// Load and validate a deployment descriptor
    pub fn load_manifest(&self, path: &Path) -> CliResult<Manifest> {
        let source = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                CliError::NotFound(format!("descriptor {}", path.display()))
            }
            _ => CliError::Io(e),
        })?;
        let manifest = Manifest::load(&source)?;
        debug!(
            deployment = %manifest.name,
            instance_groups = manifest.instance_groups.len(),
            "Loaded descriptor"
        );
        Ok(manifest)
    }

    /// Pipeline reading specs and templates from the release directory
    pub fn pipeline(&self, run_hooks: bool) -> CliResult<Pipeline> {
        let mut builder = PipelineBuilder::new()
            .with_config(self.resolver.clone())
            .with_spec_provider(Arc::new(DirectoryReleaseSpecProvider::new(
                &self.releases_dir,
            )))
            .with_renderer(Arc::new(HandlebarsRenderer::new()));
        if run_hooks {
            builder = builder.with_hook_runner(Arc::new(CommandHookRunner::new()));
        }
        Ok(builder.build()?)
    }
}
