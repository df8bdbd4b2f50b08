//! Keel CLI - Command-line interface for deployment descriptor resolution
//!
//! Operators use it to:
//! - Resolve instance groups into links, addresses and process configs
//! - Inspect instance identities and DNS addresses
//! - Check where add-ons are placed
//! - Dump the deployment's link table

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
pub mod output;
mod render;

use commands::{addons, instances, links, resolve, Workspace};
use config::CliConfig;
pub use error::{CliError, CliResult};
pub use render::HandlebarsRenderer;

const DEFAULT_RELEASES_DIR: &str = "releases";

/// Keel CLI application
#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Keel - Deployment descriptor resolver", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "KEEL_CONFIG")]
    config: Option<String>,

    /// Release source directory
    #[arg(short, long, env = "KEEL_RELEASES")]
    releases: Option<PathBuf>,

    /// Namespace addresses are scoped to
    #[arg(short, long, env = "KEEL_NAMESPACE")]
    namespace: Option<String>,

    /// Cluster DNS suffix
    #[arg(long, env = "KEEL_CLUSTER_DOMAIN")]
    cluster_domain: Option<String>,

    /// Operator image recorded on resolved groups
    #[arg(long, env = "KEEL_OPERATOR_IMAGE")]
    operator_image: Option<String>,

    /// Output format (table, json, yaml)
    #[arg(short, long)]
    output: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Resolve instance groups
    Resolve(resolve::ResolveArgs),

    /// Show instance ids and addresses of a group
    Instances(instances::InstancesArgs),

    /// Show add-on placement per instance group
    Addons(addons::AddonsArgs),

    /// Show the deployment's link table
    Links(links::LinksArgs),

    /// Show configuration
    Config,
}

/// Run using the current process arguments.
pub async fn run() -> CliResult<()> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator.
pub async fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // Logs go to stderr so structured output stays parseable
    let filter = if cli.verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();

    let config = CliConfig::load(cli.config.as_deref())?;
    let format = cli.output.or(config.output).unwrap_or_default();

    let mut resolver = config.resolver_config();
    if let Some(namespace) = cli.namespace {
        resolver.namespace = namespace;
    }
    if let Some(domain) = cli.cluster_domain {
        resolver.cluster_domain = domain;
    }
    if cli.operator_image.is_some() {
        resolver.operator_image = cli.operator_image;
    }
    let workspace = Workspace {
        releases_dir: cli
            .releases
            .or_else(|| config.releases_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RELEASES_DIR)),
        resolver,
    };

    match cli.command {
        Commands::Resolve(args) => resolve::execute(args, &workspace, format).await,
        Commands::Instances(args) => instances::execute(args, &workspace, format).await,
        Commands::Addons(args) => addons::execute(args, &workspace, format).await,
        Commands::Links(args) => links::execute(args, &workspace, format).await,
        Commands::Config => output::print_single(&workspace, format),
    }
}
