//! Process config resolution
//!
//! A job's process config is rendered once per instance from the template
//! whose destination matches the configured one. The first rendering is
//! canonical; instances that render differently only flag the result as
//! non-uniform. An operator override under `keel.bpm` is then merged in by
//! process name.

use crate::error::{ResolveError, Result};
use crate::render::{RenderInput, TemplateRef, TemplateRenderer};
use keel_types::{BpmConfig, Job, JobSpec, Process, PropertyValue};
use tracing::{debug, warn};

const OVERRIDE_PROCESSES_KEY: &str = "processes";

/// Resolves the canonical process config of jobs
pub struct BpmResolver<'a> {
    renderer: &'a dyn TemplateRenderer,
    destination: &'a str,
}

impl<'a> BpmResolver<'a> {
    pub fn new(renderer: &'a dyn TemplateRenderer, destination: &'a str) -> Self {
        Self {
            renderer,
            destination,
        }
    }

    /// Canonical process config of `job`.
    ///
    /// The job's instances and consumed links must already be resolved.
    pub fn resolve(
        &self,
        deployment: &str,
        instance_group: &str,
        job: &Job,
        spec: &JobSpec,
    ) -> Result<BpmConfig> {
        let overrides = job
            .bpm_override()
            .map(|value| parse_override(&job.name, value))
            .transpose()?;

        let Some((source, destination)) = spec.template_for_destination(self.destination) else {
            return match overrides {
                Some(processes) => {
                    debug!(job = %job.name, "Using process config override without template");
                    Ok(BpmConfig::new(processes))
                }
                None => Err(ResolveError::TemplateLookup {
                    job: job.name.clone(),
                    release: job.release.clone(),
                    destination: self.destination.to_owned(),
                }),
            };
        };

        let template = TemplateRef {
            release: job.release.clone(),
            job: job.name.clone(),
            source: source.to_owned(),
            destination: destination.to_owned(),
            job_dir: spec.location.clone(),
        };

        let mut properties = spec.default_properties();
        properties.merge(&job.properties);

        let mut rendered = Vec::with_capacity(job.resolved.instances.len());
        for instance in &job.resolved.instances {
            let input = RenderInput {
                deployment,
                instance_group,
                job: &job.name,
                properties: &properties,
                links: &job.resolved.consumes,
                instance,
            };
            let render_failed = |reason: String| ResolveError::Render {
                job: job.name.clone(),
                template: template.source.clone(),
                index: instance.index,
                reason,
            };

            let output = self
                .renderer
                .render(&template, &input)
                .map_err(|e| render_failed(e.to_string()))?;
            let config = BpmConfig::from_yaml(&output).map_err(|e| render_failed(e.to_string()))?;
            if let Some(position) = config.processes.iter().position(|p| p.name.is_empty()) {
                return Err(render_failed(format!("process {position} has no name")));
            }
            rendered.push(config);
        }

        let uniform = is_uniform(&rendered);
        let mut canonical = rendered.into_iter().next().unwrap_or_default();
        if !uniform {
            warn!(
                instance_group = %instance_group,
                job = %job.name,
                "Instances rendered different process configs, using the first"
            );
            canonical.non_uniform = true;
        }

        if let Some(processes) = overrides {
            merge_processes(&mut canonical, processes);
        }
        Ok(canonical)
    }
}

/// Whether every config lists the same processes as the first
pub fn is_uniform(configs: &[BpmConfig]) -> bool {
    match configs.split_first() {
        Some((first, rest)) => rest.iter().all(|config| config.processes == first.processes),
        None => true,
    }
}

/// Parse the processes of an override value
pub fn parse_override(job: &str, value: &PropertyValue) -> Result<Vec<Process>> {
    let malformed = |reason: String| ResolveError::Merge {
        job: job.to_owned(),
        reason,
    };

    let PropertyValue::Object(fields) = value else {
        return Err(malformed("override must be a map with a processes list".into()));
    };
    if let Some(unknown) = fields.keys().find(|key| key.as_str() != OVERRIDE_PROCESSES_KEY) {
        return Err(malformed(format!("unknown override key {unknown}")));
    }

    let entries = match fields.get(OVERRIDE_PROCESSES_KEY) {
        None => return Err(malformed("override declares no processes".into())),
        Some(PropertyValue::Null) => return Ok(Vec::new()),
        Some(PropertyValue::List(entries)) => entries,
        Some(_) => return Err(malformed("processes must be a list".into())),
    };

    entries
        .iter()
        .enumerate()
        .map(|(position, entry)| {
            let process: Process = entry
                .deserialize_into()
                .map_err(|e| malformed(format!("process entry {position}: {e}")))?;
            if process.name.is_empty() {
                return Err(malformed(format!("process entry {position} has no name")));
            }
            Ok(process)
        })
        .collect()
}

/// Merge override processes into `base` by name.
///
/// Set override fields replace base fields; unset ones keep the base value.
/// Processes only present in the override are appended.
pub fn merge_processes(base: &mut BpmConfig, overrides: Vec<Process>) {
    for process in overrides {
        match base.processes.iter_mut().find(|p| p.name == process.name) {
            Some(existing) => overlay_process(existing, process),
            None => base.processes.push(process),
        }
    }
}

fn overlay_process(base: &mut Process, overlay: Process) {
    let Process {
        name: _,
        executable,
        args,
        env,
        workdir,
        limits,
        ephemeral_disk,
        persistent_disk,
        additional_volumes,
        capabilities,
        hooks,
        unsafe_config,
        shutdown_signal,
    } = overlay;

    replace(&mut base.executable, executable);
    replace(&mut base.args, args);
    replace(&mut base.env, env);
    replace(&mut base.workdir, workdir);
    replace(&mut base.ephemeral_disk, ephemeral_disk);
    replace(&mut base.persistent_disk, persistent_disk);
    replace(&mut base.additional_volumes, additional_volumes);
    replace(&mut base.capabilities, capabilities);
    replace(&mut base.unsafe_config, unsafe_config);
    replace(&mut base.shutdown_signal, shutdown_signal);

    match (&mut base.limits, limits) {
        (Some(existing), Some(limits)) => {
            replace(&mut existing.memory, limits.memory);
            replace(&mut existing.open_files, limits.open_files);
            replace(&mut existing.processes, limits.processes);
        }
        (slot, limits) => replace(slot, limits),
    }

    match (&mut base.hooks, hooks) {
        (Some(existing), Some(hooks)) => replace(&mut existing.pre_start, hooks.pre_start),
        (slot, hooks) => replace(slot, hooks),
    }
}

fn replace<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}
