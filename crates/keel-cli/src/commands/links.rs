//! Show the deployment's link table

use crate::commands::Workspace;
use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use clap::Args;
use keel_types::Link;
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

/// Arguments of `keel links`
#[derive(Debug, Args)]
pub struct LinksArgs {
    /// Deployment descriptor (YAML)
    #[arg(short, long)]
    pub manifest: PathBuf,
}

#[derive(Debug, Serialize)]
struct LinkEntry<'a> {
    #[serde(rename = "type")]
    link_type: &'a str,
    name: &'a str,
    #[serde(flatten)]
    link: &'a Link,
}

#[derive(Debug, Tabled)]
struct LinkRow {
    #[tabled(rename = "type")]
    link_type: String,
    name: String,
    address: String,
    instances: usize,
    properties: String,
}

/// Execute `keel links`
pub async fn execute(args: LinksArgs, workspace: &Workspace, format: OutputFormat) -> CliResult<()> {
    let manifest = workspace.load_manifest(&args.manifest)?;
    let table = workspace.pipeline(false)?.link_table(&manifest)?;

    let entries: Vec<LinkEntry<'_>> = table
        .iter()
        .map(|(key, link)| LinkEntry {
            link_type: &key.link_type,
            name: &key.name,
            link,
        })
        .collect();
    let rows: Vec<LinkRow> = entries
        .iter()
        .map(|entry| LinkRow {
            link_type: entry.link_type.to_string(),
            name: entry.name.to_string(),
            address: entry.link.address.clone(),
            instances: entry.link.instances.len(),
            properties: entry.link.properties.to_string(),
        })
        .collect();
    output::print_output(rows, &entries, format)
}
