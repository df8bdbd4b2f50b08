//! Show add-on placement

use crate::commands::Workspace;
use crate::error::CliResult;
use crate::output::{self, OutputFormat};
use clap::Args;
use keel_resolver::addon_applies;
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

/// Arguments of `keel addons`
#[derive(Debug, Args)]
pub struct AddonsArgs {
    /// Deployment descriptor (YAML)
    #[arg(short, long)]
    pub manifest: PathBuf,
}

/// Placement decision of one add-on on one instance group
#[derive(Debug, Serialize, Tabled)]
struct PlacementRow {
    addon: String,
    instance_group: String,
    placed: String,
}

/// Execute `keel addons`
pub async fn execute(
    args: AddonsArgs,
    workspace: &Workspace,
    format: OutputFormat,
) -> CliResult<()> {
    let manifest = workspace.load_manifest(&args.manifest)?;

    let mut rows = Vec::new();
    for addon in &manifest.addons {
        for group in &manifest.instance_groups {
            // A failed match only affects its own row
            let placed = match addon_applies(&manifest, group, addon) {
                Ok(true) => "yes".to_string(),
                Ok(false) => "no".to_string(),
                Err(e) => format!("error: {}", e),
            };
            rows.push(PlacementRow {
                addon: addon.name.clone(),
                instance_group: group.name.clone(),
                placed,
            });
        }
    }

    let data = serde_json::to_value(&rows)?;
    output::print_output(rows, &data, format)
}
