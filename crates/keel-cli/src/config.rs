//! CLI configuration

use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;
use keel_resolver::ResolverConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CLI configuration, read from `<config dir>/keel/config.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CliConfig {
    /// Directory holding release sources (`<release>/jobs/<job>/spec`)
    pub releases_dir: Option<PathBuf>,

    /// Namespace addresses are scoped to
    pub namespace: Option<String>,

    /// Cluster DNS suffix
    pub cluster_domain: Option<String>,

    /// Operator image recorded on resolved groups
    pub operator_image: Option<String>,

    /// Template destination of process configs
    pub bpm_destination: Option<String>,

    /// Default output format
    pub output: Option<OutputFormat>,
}

impl CliConfig {
    /// Load configuration from file
    pub fn load(path: Option<&str>) -> CliResult<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let config: CliConfig =
                toml::from_str(&contents).map_err(|e| CliError::Config(e.to_string()))?;
            Ok(config)
        } else {
            Ok(CliConfig::default())
        }
    }

    /// Resolver configuration with file values layered over the defaults
    pub fn resolver_config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::default();
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(domain) = &self.cluster_domain {
            config.cluster_domain = domain.clone();
        }
        if let Some(destination) = &self.bpm_destination {
            config.bpm_destination = destination.clone();
        }
        config.operator_image = self.operator_image.clone();
        config
    }

    /// Get the default configuration file path
    fn default_config_path() -> CliResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Cannot find config directory".into()))?;
        Ok(config_dir.join("keel").join("config.toml"))
    }
}
