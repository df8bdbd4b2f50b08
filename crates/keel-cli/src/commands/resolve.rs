//! Resolve instance groups

use crate::commands::Workspace;
use crate::error::{CliError, CliResult};
use crate::output::{self, print_success, print_warning, yes_no, OutputFormat};
use clap::Args;
use keel_resolver::{BpmConfigSet, ResolvedInstanceGroup};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::Tabled;
use tracing::info;

/// Arguments of `keel resolve`
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Deployment descriptor (YAML)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Instance group to resolve (repeatable)
    #[arg(short = 'g', long = "instance-group")]
    pub instance_groups: Vec<String>,

    /// Resolve every instance group
    #[arg(long, conflicts_with = "instance_groups")]
    pub all: bool,

    /// Run the pre-render hooks declared by jobs
    #[arg(long)]
    pub run_hooks: bool,

    /// Print only the process configs of each group
    #[arg(long)]
    pub process_configs: bool,
}

/// Table row for a resolved job
#[derive(Debug, Serialize, Tabled)]
struct JobRow {
    instance_group: String,
    job: String,
    release: String,
    instances: usize,
    links: String,
    processes: usize,
    uniform: String,
    addon: String,
}

fn job_rows(group: &ResolvedInstanceGroup) -> Vec<JobRow> {
    group
        .instance_group
        .jobs
        .iter()
        .map(|job| {
            let bpm = job.resolved.bpm.as_ref();
            JobRow {
                instance_group: group.name().to_string(),
                job: job.name.clone(),
                release: job.release.clone(),
                instances: job.resolved.instances.len(),
                links: job.resolved.consumes.keys().cloned().collect::<Vec<_>>().join(","),
                processes: bpm.map(|b| b.processes.len()).unwrap_or(0),
                uniform: yes_no(!bpm.map(|b| b.non_uniform).unwrap_or(false)),
                addon: job.addon.clone().unwrap_or_default(),
            }
        })
        .collect()
}

/// Execute `keel resolve`
pub async fn execute(
    args: ResolveArgs,
    workspace: &Workspace,
    format: OutputFormat,
) -> CliResult<()> {
    let manifest = Arc::new(workspace.load_manifest(&args.manifest)?);
    let pipeline = workspace.pipeline(args.run_hooks)?;

    let groups: Vec<String> = if args.all || args.instance_groups.is_empty() {
        manifest.instance_groups.iter().map(|g| g.name.clone()).collect()
    } else {
        args.instance_groups
    };
    if let Some(missing) = groups.iter().find(|g| manifest.instance_group(g).is_none()) {
        return Err(CliError::NotFound(format!("instance group {}", missing)));
    }

    info!(deployment = %manifest.name, groups = groups.len(), "Resolving instance groups");

    let handles: Vec<_> = groups
        .into_iter()
        .map(|group| {
            let pipeline = pipeline.clone();
            let manifest = Arc::clone(&manifest);
            tokio::task::spawn_blocking(move || pipeline.resolve(&manifest, &group))
        })
        .collect();

    let mut resolved = Vec::with_capacity(handles.len());
    for handle in handles {
        resolved.push(handle.await??);
    }

    if args.process_configs {
        let sets = resolved
            .iter()
            .map(ResolvedInstanceGroup::process_configs)
            .collect::<Result<Vec<BpmConfigSet>, _>>()?;
        return output::print_single(&sets, format);
    }

    let rows: Vec<JobRow> = resolved.iter().flat_map(job_rows).collect();
    output::print_output(rows, &resolved, format)?;

    if format == OutputFormat::Table {
        for group in &resolved {
            let set = group.process_configs()?;
            for (job, config) in &set.configs {
                if config.non_uniform {
                    print_warning(&format!(
                        "{}/{}: instances rendered different process configs",
                        group.name(),
                        job
                    ));
                }
            }
            print_success(&format!("{} resolved (process configs {})", group.name(), set.digest));
        }
    }
    Ok(())
}
