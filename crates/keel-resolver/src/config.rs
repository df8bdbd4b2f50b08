//! Resolver configuration
//!
//! Everything the pipeline needs beyond the descriptor itself is passed in
//! explicitly through [`ResolverConfig`]; nothing is read from process-wide
//! state.

use serde::{Deserialize, Serialize};

/// Default template destination of a job's process config
pub const DEFAULT_BPM_DESTINATION: &str = "config/bpm.yml";

/// Configuration for a resolution run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Namespace scope addresses and ids are derived in
    pub namespace: String,

    /// DNS suffix appended to instance addresses
    pub cluster_domain: String,

    /// Template destination identifying a job's process config
    pub bpm_destination: String,

    /// Container image handed to downstream resource generation
    pub operator_image: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            namespace: "default".into(),
            cluster_domain: "cluster.local".into(),
            bpm_destination: DEFAULT_BPM_DESTINATION.into(),
            operator_image: None,
        }
    }
}

impl ResolverConfig {
    /// Create a config scoped to a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_cluster_domain(mut self, domain: impl Into<String>) -> Self {
        self.cluster_domain = domain.into();
        self
    }

    pub fn with_bpm_destination(mut self, destination: impl Into<String>) -> Self {
        self.bpm_destination = destination.into();
        self
    }

    pub fn with_operator_image(mut self, image: impl Into<String>) -> Self {
        self.operator_image = Some(image.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.namespace, "default");
        assert_eq!(config.cluster_domain, "cluster.local");
        assert_eq!(config.bpm_destination, "config/bpm.yml");
        assert!(config.operator_image.is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ResolverConfig = serde_json::from_str(r#"{"namespace": "prod"}"#).unwrap();
        assert_eq!(config.namespace, "prod");
        assert_eq!(config.cluster_domain, "cluster.local");
    }
}
