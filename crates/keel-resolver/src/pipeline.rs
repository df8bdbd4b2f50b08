//! Resolution pipeline
//!
//! Resolves one instance group of a deployment descriptor through a fixed
//! sequence of stages:
//!
//! 1. apply add-ons to the descriptor
//! 2. run pre-render hooks of the group's jobs
//! 3. build the deployment-wide link table
//! 4. address the group's jobs and resolve their consumed links
//! 5. render and merge the group's process configs
//!
//! Each run works on its own copy of the descriptor. Any failure aborts the
//! run and is reported with the stage it happened in.

use crate::addon::apply_addons;
use crate::addressing::InstanceAddresser;
use crate::bpm::BpmResolver;
use crate::config::ResolverConfig;
use crate::error::{PipelineError, ResolveError};
use crate::hooks::{HookError, HookRunner, NoopHookRunner, PreRenderHook};
use crate::links::{build_link_table, resolve_consumers, LinkTable};
use crate::provider::{JobSpecs, ReleaseSpecProvider};
use crate::render::TemplateRenderer;
use keel_types::{BpmConfig, InstanceGroup, Manifest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Start,
    ApplyAddons,
    PreRenderHooks,
    BuildLinkTable,
    ResolveConsumersAndAddressing,
    RenderAndMergeProcessConfigs,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::ApplyAddons => "apply-addons",
            Stage::PreRenderHooks => "pre-render-hooks",
            Stage::BuildLinkTable => "build-link-table",
            Stage::ResolveConsumersAndAddressing => "resolve-consumers-and-addressing",
            Stage::RenderAndMergeProcessConfigs => "render-and-merge-process-configs",
        };
        write!(f, "{}", name)
    }
}

/// A fully resolved instance group
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedInstanceGroup {
    pub deployment: String,
    pub namespace: String,

    /// Image downstream resource generation runs the group with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_image: Option<String>,

    /// The group with every job's resolution filled in
    pub instance_group: InstanceGroup,
}

impl ResolvedInstanceGroup {
    pub fn name(&self) -> &str {
        &self.instance_group.name
    }

    /// Canonical process config of every job, with a content digest
    pub fn process_configs(&self) -> Result<BpmConfigSet, serde_json::Error> {
        let configs = self
            .instance_group
            .jobs
            .iter()
            .filter_map(|job| job.resolved.bpm.clone().map(|bpm| (job.name.clone(), bpm)))
            .collect();
        BpmConfigSet::new(&self.instance_group.name, configs)
    }
}

/// Process configs of an instance group keyed by job name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpmConfigSet {
    pub instance_group: String,
    pub configs: BTreeMap<String, BpmConfig>,

    /// blake3 digest of the canonical JSON encoding of `configs`
    pub digest: String,
}

impl BpmConfigSet {
    pub fn new(
        instance_group: impl Into<String>,
        configs: BTreeMap<String, BpmConfig>,
    ) -> Result<Self, serde_json::Error> {
        let digest = blake3::hash(&serde_json::to_vec(&configs)?).to_hex().to_string();
        Ok(Self {
            instance_group: instance_group.into(),
            configs,
            digest,
        })
    }
}

/// Resolves instance groups of deployment descriptors
#[derive(Clone)]
pub struct Pipeline {
    config: ResolverConfig,
    provider: Arc<dyn ReleaseSpecProvider>,
    renderer: Arc<dyn TemplateRenderer>,
    hooks: Arc<dyn HookRunner>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline that skips pre-render hooks
    pub fn new(
        config: ResolverConfig,
        provider: Arc<dyn ReleaseSpecProvider>,
        renderer: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            config,
            provider,
            renderer,
            hooks: Arc::new(NoopHookRunner),
        }
    }

    pub fn with_hook_runner(mut self, hooks: Arc<dyn HookRunner>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve one instance group
    #[instrument(skip(self, manifest), fields(deployment = %manifest.name))]
    pub fn resolve(
        &self,
        manifest: &Manifest,
        instance_group: &str,
    ) -> Result<ResolvedInstanceGroup, PipelineError> {
        let at = |stage: Stage| {
            move |source: ResolveError| PipelineError::new(stage, instance_group, source)
        };

        if manifest.instance_group(instance_group).is_none() {
            return Err(at(Stage::Start)(ResolveError::InstanceGroupNotFound(
                instance_group.to_owned(),
            )));
        }

        let mut manifest = manifest.clone();
        let deployment = manifest.name.clone();
        let addresser = InstanceAddresser::new(&deployment, &self.config);

        apply_addons(&mut manifest).map_err(at(Stage::ApplyAddons))?;
        let group = find_group(&manifest, instance_group).map_err(at(Stage::ApplyAddons))?;

        self.run_hooks(&deployment, group).map_err(at(Stage::PreRenderHooks))?;

        let specs = JobSpecs::fetch(&manifest, self.provider.as_ref())
            .map_err(at(Stage::BuildLinkTable))?;
        let table =
            build_link_table(&manifest, &specs, &addresser).map_err(at(Stage::BuildLinkTable))?;
        debug!(links = table.len(), specs = specs.len(), "Link table ready");

        let resolutions = group
            .jobs
            .iter()
            .map(|job| {
                let spec = specs.require(&job.release, &job.name)?;
                let instances = addresser.job_instances(group, &job.name)?;
                let consumes = resolve_consumers(&group.name, job, spec, &table)?;
                Ok((instances, consumes))
            })
            .collect::<Result<Vec<_>, ResolveError>>()
            .map_err(at(Stage::ResolveConsumersAndAddressing))?;

        let group = find_group_mut(&mut manifest, instance_group)
            .map_err(at(Stage::ResolveConsumersAndAddressing))?;
        for (job, (instances, consumes)) in group.jobs.iter_mut().zip(resolutions) {
            job.resolved.instances = instances;
            job.resolved.consumes = consumes;
        }

        let bpm = BpmResolver::new(self.renderer.as_ref(), &self.config.bpm_destination);
        for job in group.jobs.iter_mut() {
            let spec = specs
                .require(&job.release, &job.name)
                .map_err(at(Stage::RenderAndMergeProcessConfigs))?;
            let config = bpm
                .resolve(&deployment, &group.name, job, spec)
                .map_err(at(Stage::RenderAndMergeProcessConfigs))?;
            job.resolved.bpm = Some(config);
        }

        info!(
            instance_group = %group.name,
            jobs = group.jobs.len(),
            "Instance group resolved"
        );

        Ok(ResolvedInstanceGroup {
            deployment,
            namespace: self.config.namespace.clone(),
            operator_image: self.config.operator_image.clone(),
            instance_group: group.clone(),
        })
    }

    /// Resolve every instance group, stopping at the first failure
    pub fn resolve_all(
        &self,
        manifest: &Manifest,
    ) -> Result<Vec<ResolvedInstanceGroup>, PipelineError> {
        manifest
            .instance_groups
            .iter()
            .map(|group| self.resolve(manifest, &group.name))
            .collect()
    }

    /// Deployment-wide link table, with add-ons applied
    #[instrument(skip(self, manifest), fields(deployment = %manifest.name))]
    pub fn link_table(&self, manifest: &Manifest) -> Result<LinkTable, PipelineError> {
        let at = |stage: Stage| {
            move |source: ResolveError| PipelineError::new(stage, "*", source)
        };

        let mut manifest = manifest.clone();
        apply_addons(&mut manifest).map_err(at(Stage::ApplyAddons))?;

        let specs = JobSpecs::fetch(&manifest, self.provider.as_ref())
            .map_err(at(Stage::BuildLinkTable))?;
        let addresser = InstanceAddresser::new(&manifest.name, &self.config);
        build_link_table(&manifest, &specs, &addresser).map_err(at(Stage::BuildLinkTable))
    }

    fn run_hooks(&self, deployment: &str, group: &InstanceGroup) -> Result<(), ResolveError> {
        for job in &group.jobs {
            let hook_failed = |source: HookError| ResolveError::Hook {
                instance_group: group.name.clone(),
                job: job.name.clone(),
                source,
            };

            let scripts = job
                .pre_render_scripts()
                .map_err(|e| hook_failed(HookError::InvalidDeclaration(e.to_string())))?;
            if scripts.is_empty() {
                continue;
            }

            self.hooks
                .run(&PreRenderHook {
                    deployment,
                    instance_group: &group.name,
                    job: &job.name,
                    scripts: &scripts,
                })
                .map_err(hook_failed)?;
        }
        Ok(())
    }
}

fn find_group<'a>(manifest: &'a Manifest, name: &str) -> Result<&'a InstanceGroup, ResolveError> {
    manifest
        .instance_group(name)
        .ok_or_else(|| ResolveError::InstanceGroupNotFound(name.to_owned()))
}

fn find_group_mut<'a>(
    manifest: &'a mut Manifest,
    name: &str,
) -> Result<&'a mut InstanceGroup, ResolveError> {
    manifest
        .instance_group_mut(name)
        .ok_or_else(|| ResolveError::InstanceGroupNotFound(name.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::provider::InMemoryReleaseSpecProvider;
    use crate::render::{FnTemplateRenderer, RenderInput, TemplateRef};
    use keel_types::{JobSpec, Process};

    fn pipeline(provider: InMemoryReleaseSpecProvider) -> Pipeline {
        let renderer = FnTemplateRenderer::new(|template: &TemplateRef, _: &RenderInput<'_>| {
            Ok(format!("processes:\n  - name: {}\n", template.job).into_bytes())
        });
        Pipeline::new(
            ResolverConfig::default().with_operator_image("keel/operator:1.0"),
            Arc::new(provider),
            Arc::new(renderer),
        )
    }

    fn manifest() -> Manifest {
        Manifest::load(
            r#"
name: d
releases: [{ name: app }]
instance_groups:
  - name: web
    instances: 1
    jobs: [{ name: server, release: app }]
"#,
        )
        .unwrap()
    }

    fn provider() -> InMemoryReleaseSpecProvider {
        InMemoryReleaseSpecProvider::new()
            .with_spec("app", JobSpec::new("server").with_template("bpm.yml", "config/bpm.yml"))
    }

    #[test]
    fn test_resolve_fills_resolution() {
        let resolved = pipeline(provider()).resolve(&manifest(), "web").unwrap();

        assert_eq!(resolved.deployment, "d");
        assert_eq!(resolved.name(), "web");
        assert_eq!(resolved.operator_image.as_deref(), Some("keel/operator:1.0"));

        let job = &resolved.instance_group.jobs[0];
        assert_eq!(job.resolved.instances.len(), 1);
        assert_eq!(
            job.resolved.bpm,
            Some(BpmConfig::new(vec![Process::new("server")]))
        );
    }

    #[test]
    fn test_unknown_group() {
        let err = pipeline(provider()).resolve(&manifest(), "nope").unwrap_err();
        assert_eq!(err.stage, Stage::Start);
        assert_eq!(err.kind(), ErrorKind::InstanceGroupNotFound);
    }

    #[test]
    fn test_missing_spec_fails_link_table_stage() {
        let err = pipeline(InMemoryReleaseSpecProvider::new())
            .resolve(&manifest(), "web")
            .unwrap_err();
        assert_eq!(err.stage, Stage::BuildLinkTable);
        assert_eq!(err.instance_group, "web");
        assert_eq!(err.kind(), ErrorKind::ReleaseLookupFailure);
    }

    #[test]
    fn test_input_descriptor_is_untouched() {
        let manifest = manifest();
        pipeline(provider()).resolve(&manifest, "web").unwrap();
        assert!(manifest.instance_groups[0].jobs[0].resolved.is_empty());
        assert!(!manifest.addons_applied);
    }

    #[test]
    fn test_digest_is_stable() {
        let pipeline = pipeline(provider());
        let first = pipeline.resolve(&manifest(), "web").unwrap().process_configs().unwrap();
        let second = pipeline.resolve(&manifest(), "web").unwrap().process_configs().unwrap();

        assert_eq!(first.digest, second.digest);
        assert_eq!(first.digest.len(), 64);
        assert!(first.configs.contains_key("server"));
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::BuildLinkTable.to_string(), "build-link-table");
    }
}
