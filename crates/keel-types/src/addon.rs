//! Add-on declarations
//!
//! An add-on is a cross-cutting set of jobs attached to every instance group
//! matched by its `include` rules and not matched by its `exclude` rules.

use crate::manifest::{Job, LinkOverride};
use crate::property::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cross-cutting job set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Addon {
    pub name: String,

    #[serde(default)]
    pub jobs: Vec<AddonJob>,

    /// Groups to attach to; absent means every group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<PlacementRules>,

    /// Groups to skip; absent means none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<PlacementRules>,
}

/// Job template carried by an add-on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddonJob {
    pub name: String,

    pub release: String,

    #[serde(default, skip_serializing_if = "PropertyValue::is_null")]
    pub properties: PropertyValue,

    /// Consumed link overrides (`from:` or `"nil"`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub consumes: BTreeMap<String, LinkOverride>,

    /// Provided link overrides (`as:` or `"nil"`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provides: BTreeMap<String, LinkOverride>,
}

impl AddonJob {
    /// Instantiate the job for attachment to an instance group
    pub fn to_job(&self, addon: &str) -> Job {
        let mut job = Job::new(&self.name, &self.release).with_properties(self.properties.clone());
        job.consumes = self.consumes.clone();
        job.provides = self.provides.clone();
        job.addon = Some(addon.to_owned());
        job
    }
}

/// Placement rule set; categories are OR-combined
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRules {
    /// Operating systems of the stemcells a group's jobs run on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stemcell: Vec<StemcellRule>,

    /// (release, job) pairs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jobs: Vec<JobRule>,

    /// Instance group names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instance_groups: Vec<String>,
}

impl PlacementRules {
    pub fn is_empty(&self) -> bool {
        self.stemcell.is_empty() && self.jobs.is_empty() && self.instance_groups.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemcellRule {
    pub os: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRule {
    pub name: String,
    pub release: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_addon() {
        let addon: Addon = serde_yaml::from_str(
            r#"
name: os-conf
jobs:
  - name: login_banner
    release: os-conf
    properties: { text: hello }
include:
  stemcell:
    - os: ubuntu-jammy
  jobs:
    - { name: server, release: app }
exclude:
  instance_groups: [db]
"#,
        )
        .unwrap();

        let include = addon.include.as_ref().unwrap();
        assert_eq!(include.stemcell[0].os, "ubuntu-jammy");
        assert_eq!(include.jobs[0].release, "app");
        assert!(include.instance_groups.is_empty());
        assert_eq!(addon.exclude.as_ref().unwrap().instance_groups, vec!["db"]);

        let job = addon.jobs[0].to_job(&addon.name);
        assert_eq!(job.addon.as_deref(), Some("os-conf"));
        assert_eq!(job.properties.get_path("text").and_then(|v| v.as_str()), Some("hello"));
        assert!(job.consumes.is_empty());
    }

    #[test]
    fn test_addon_job_carries_link_overrides() {
        let addon: Addon = serde_yaml::from_str(
            r#"
name: metrics
jobs:
  - name: exporter
    release: monitoring
    consumes: { target: { from: primary } }
    provides: { scrape: { as: exporter-scrape }, debug: nil }
"#,
        )
        .unwrap();

        let job = addon.jobs[0].to_job(&addon.name);
        assert_eq!(job.consumes["target"], LinkOverride::from_link("primary"));
        assert_eq!(job.provides["scrape"], LinkOverride::alias("exporter-scrape"));
        assert!(job.provides["debug"].is_blocked());
        assert_eq!(job.addon.as_deref(), Some("metrics"));
    }
}
