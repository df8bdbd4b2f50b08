//! Show job instance identities

use crate::commands::Workspace;
use crate::error::{CliError, CliResult};
use crate::output::{self, yes_no, OutputFormat};
use clap::Args;
use keel_resolver::{apply_addons, InstanceAddresser};
use keel_types::JobInstance;
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

/// Arguments of `keel instances`
#[derive(Debug, Args)]
pub struct InstancesArgs {
    /// Deployment descriptor (YAML)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Instance group to address
    #[arg(short = 'g', long = "instance-group")]
    pub instance_group: String,
}

#[derive(Debug, Serialize)]
struct JobInstances {
    job: String,
    instances: Vec<JobInstance>,
}

#[derive(Debug, Tabled)]
struct InstanceRow {
    job: String,
    index: usize,
    az: String,
    address: String,
    bootstrap: String,
    id: String,
}

/// Execute `keel instances`
pub async fn execute(
    args: InstancesArgs,
    workspace: &Workspace,
    format: OutputFormat,
) -> CliResult<()> {
    let mut manifest = workspace.load_manifest(&args.manifest)?;
    apply_addons(&mut manifest)?;

    let group = manifest
        .instance_group(&args.instance_group)
        .ok_or_else(|| CliError::NotFound(format!("instance group {}", args.instance_group)))?;
    let addresser = InstanceAddresser::new(&manifest.name, &workspace.resolver);

    let jobs = group
        .jobs
        .iter()
        .map(|job| -> CliResult<JobInstances> {
            Ok(JobInstances {
                job: job.name.clone(),
                instances: addresser.job_instances(group, &job.name)?,
            })
        })
        .collect::<CliResult<Vec<_>>>()?;

    let rows: Vec<InstanceRow> = jobs
        .iter()
        .flat_map(|entry| {
            entry.instances.iter().map(|instance| InstanceRow {
                job: entry.job.clone(),
                index: instance.index,
                az: instance.az.clone(),
                address: instance.address.clone(),
                bootstrap: yes_no(instance.bootstrap),
                id: instance.id.clone(),
            })
        })
        .collect();
    output::print_output(rows, &jobs, format)
}
