//! Builder for [`Pipeline`]

use crate::config::ResolverConfig;
use crate::error::BuildError;
use crate::hooks::{HookRunner, NoopHookRunner};
use crate::pipeline::Pipeline;
use crate::provider::ReleaseSpecProvider;
use crate::render::TemplateRenderer;
use std::sync::Arc;

/// Assembles a pipeline from its collaborators
#[derive(Default)]
pub struct PipelineBuilder {
    config: ResolverConfig,
    provider: Option<Arc<dyn ReleaseSpecProvider>>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
    hooks: Option<Arc<dyn HookRunner>>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the release job spec source
    pub fn with_spec_provider(mut self, provider: Arc<dyn ReleaseSpecProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the template renderer
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set the pre-render hook runner; hooks are skipped when unset
    pub fn with_hook_runner(mut self, hooks: Arc<dyn HookRunner>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        let provider = self
            .provider
            .ok_or(BuildError::MissingComponent("spec provider"))?;
        let renderer = self
            .renderer
            .ok_or(BuildError::MissingComponent("template renderer"))?;
        let hooks = self.hooks.unwrap_or_else(|| Arc::new(NoopHookRunner));

        Ok(Pipeline::new(self.config, provider, renderer).with_hook_runner(hooks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryReleaseSpecProvider;
    use crate::render::{FnTemplateRenderer, RenderInput, TemplateRef};

    #[test]
    fn test_builder_missing_fields() {
        let result = PipelineBuilder::new()
            .with_spec_provider(Arc::new(InMemoryReleaseSpecProvider::new()))
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingComponent("template renderer"))
        ));
    }

    #[test]
    fn test_builder_complete() {
        let pipeline = PipelineBuilder::new()
            .with_config(ResolverConfig::new("prod"))
            .with_spec_provider(Arc::new(InMemoryReleaseSpecProvider::new()))
            .with_renderer(Arc::new(FnTemplateRenderer::new(
                |_: &TemplateRef, _: &RenderInput<'_>| Ok(Vec::new()),
            )))
            .build()
            .unwrap();

        assert_eq!(pipeline.config().namespace, "prod");
    }
}
