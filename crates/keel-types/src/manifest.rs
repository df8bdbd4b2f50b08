//! Deployment descriptor
//!
//! A [`Manifest`] is parsed once per resolution run and progressively
//! annotated by the resolver: add-on jobs are appended to matching instance
//! groups, and every [`Job`] gets its [`JobResolution`] back-filled with
//! addresses, consumed links and the canonical process config.

use crate::addon::Addon;
use crate::bpm::BpmConfig;
use crate::error::{DescriptorError, Result};
use crate::instance::JobInstance;
use crate::link::Link;
use crate::property::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Property path holding an operator-supplied process config override
pub const BPM_OVERRIDE_PATH: &str = "keel.bpm";

/// Property path holding pre-render hook scripts
pub const PRE_RENDER_SCRIPTS_PATH: &str = "keel.pre_render_scripts";

/// Literal used in `consumes` / `provides` to block a link
pub const BLOCKED_LINK: &str = "nil";

/// Root deployment descriptor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Deployment name
    pub name: String,

    #[serde(default)]
    pub instance_groups: Vec<InstanceGroup>,

    #[serde(default)]
    pub releases: Vec<Release>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stemcells: Vec<Stemcell>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addons: Vec<Addon>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    /// Set once add-on jobs have been appended to their instance groups
    #[serde(skip)]
    pub addons_applied: bool,
}

impl Manifest {
    /// Parse a descriptor from YAML
    pub fn from_yaml(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Parse and validate a descriptor from YAML
    pub fn load(source: &str) -> Result<Self> {
        let manifest = Self::from_yaml(source)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check structural references inside the descriptor
    pub fn validate(&self) -> Result<()> {
        let mut groups = HashSet::new();
        for group in &self.instance_groups {
            if !groups.insert(group.name.as_str()) {
                return Err(DescriptorError::DuplicateInstanceGroup(group.name.clone()));
            }

            let mut jobs = HashSet::new();
            for job in &group.jobs {
                if !jobs.insert(job.name.as_str()) {
                    return Err(DescriptorError::DuplicateJob {
                        instance_group: group.name.clone(),
                        job: job.name.clone(),
                    });
                }
                if self.release(&job.release).is_none() {
                    return Err(DescriptorError::UndeclaredRelease {
                        instance_group: group.name.clone(),
                        job: job.name.clone(),
                        release: job.release.clone(),
                    });
                }
            }
        }

        for addon in &self.addons {
            for job in &addon.jobs {
                if self.release(&job.release).is_none() {
                    return Err(DescriptorError::UndeclaredAddonRelease {
                        addon: addon.name.clone(),
                        job: job.name.clone(),
                        release: job.release.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn instance_group(&self, name: &str) -> Option<&InstanceGroup> {
        self.instance_groups.iter().find(|g| g.name == name)
    }

    pub fn instance_group_mut(&mut self, name: &str) -> Option<&mut InstanceGroup> {
        self.instance_groups.iter_mut().find(|g| g.name == name)
    }

    pub fn release(&self, name: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.name == name)
    }

    pub fn stemcell(&self, alias: &str) -> Option<&Stemcell> {
        self.stemcells.iter().find(|s| s.alias == alias)
    }
}

/// A release referenced by the deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,

    /// Stemcell the release was compiled against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stemcell: Option<ReleaseStemcell>,
}

/// Stemcell identity attached to a compiled release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseStemcell {
    pub os: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Manifest-level stemcell declaration, referenced by alias from instance groups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stemcell {
    pub alias: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Instance group lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Lifecycle {
    /// Long-running service
    #[default]
    Service,
    /// One-shot task run on demand
    Errand,
    /// One-shot task run automatically after each deploy
    AutoErrand,
}

/// A named set of identically-configured replicas
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub name: String,

    /// Declared replica count; signed so that invalid negative counts can be reported
    #[serde(default)]
    pub instances: i64,

    /// Availability zones, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub azs: Vec<String>,

    #[serde(default)]
    pub jobs: Vec<Job>,

    #[serde(default)]
    pub lifecycle: Lifecycle,

    /// Stemcell alias
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stemcell: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<Network>,

    #[serde(default, skip_serializing_if = "PropertyValue::is_null")]
    pub env: PropertyValue,
}

impl InstanceGroup {
    pub fn is_errand(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Errand | Lifecycle::AutoErrand)
    }

    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn job_mut(&mut self, name: &str) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.name == name)
    }
}

/// Network attachment of an instance group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_ips: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default: Vec<String>,
}

/// A release job placed into an instance group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Job {
    pub name: String,

    /// Owning release name
    pub release: String,

    #[serde(default, skip_serializing_if = "PropertyValue::is_null")]
    pub properties: PropertyValue,

    /// Consumer-side link overrides, keyed by the spec-declared link name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub consumes: BTreeMap<String, LinkOverride>,

    /// Provider-side link overrides, keyed by the spec-declared link name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provides: BTreeMap<String, LinkOverride>,

    /// Links provided by this job in addition to those its release spec declares
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_provider_definitions: Vec<CustomProviderDefinition>,

    /// Name of the add-on this job was attached from
    #[serde(default, skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub addon: Option<String>,

    /// Back-filled by the resolver
    #[serde(default, skip_deserializing, skip_serializing_if = "JobResolution::is_empty")]
    pub resolved: JobResolution,
}

impl Job {
    pub fn new(name: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            release: release.into(),
            ..Default::default()
        }
    }

    pub fn with_properties(mut self, properties: PropertyValue) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_consumes(mut self, link: impl Into<String>, value: LinkOverride) -> Self {
        self.consumes.insert(link.into(), value);
        self
    }

    pub fn with_provides(mut self, link: impl Into<String>, value: LinkOverride) -> Self {
        self.provides.insert(link.into(), value);
        self
    }

    /// Whether this job was attached by an add-on
    pub fn is_addon(&self) -> bool {
        self.addon.is_some()
    }

    /// Operator-supplied process config override, if any
    pub fn bpm_override(&self) -> Option<&PropertyValue> {
        self.properties
            .get_path(BPM_OVERRIDE_PATH)
            .filter(|value| !value.is_null())
    }

    /// Pre-render hook scripts declared on this job
    pub fn pre_render_scripts(&self) -> Result<Vec<String>> {
        match self.properties.get_path(PRE_RENDER_SCRIPTS_PATH) {
            None | Some(PropertyValue::Null) => Ok(Vec::new()),
            Some(value) => value
                .deserialize_into()
                .map_err(|e| DescriptorError::InvalidProperty {
                    job: self.name.clone(),
                    path: PRE_RENDER_SCRIPTS_PATH.to_owned(),
                    reason: e.to_string(),
                }),
        }
    }
}

/// Link override on a job: either blocked with the literal `"nil"`, or a set of options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLinkOverride", into = "RawLinkOverride")]
pub enum LinkOverride {
    Blocked,
    Options(LinkOptions),
}

impl LinkOverride {
    /// Provider-side alias (`as:`)
    pub fn alias(alias: impl Into<String>) -> Self {
        LinkOverride::Options(LinkOptions {
            alias: Some(alias.into()),
            ..Default::default()
        })
    }

    /// Consumer-side source (`from:`)
    pub fn from_link(from: impl Into<String>) -> Self {
        LinkOverride::Options(LinkOptions {
            from: Some(from.into()),
            ..Default::default()
        })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, LinkOverride::Blocked)
    }

    pub fn options(&self) -> Option<&LinkOptions> {
        match self {
            LinkOverride::Options(options) => Some(options),
            LinkOverride::Blocked => None,
        }
    }
}

/// Link override options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkOptions {
    /// Externally visible name of a provided link
    #[serde(default, rename = "as", skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// Provider name a consumed link is looked up by
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawLinkOverride {
    Literal(String),
    Options(LinkOptions),
}

impl TryFrom<RawLinkOverride> for LinkOverride {
    type Error = String;

    fn try_from(raw: RawLinkOverride) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawLinkOverride::Literal(literal) if literal == BLOCKED_LINK => Ok(LinkOverride::Blocked),
            RawLinkOverride::Literal(literal) => Err(format!(
                "unsupported link override '{}', expected \"{}\" or a map",
                literal, BLOCKED_LINK
            )),
            RawLinkOverride::Options(options) => Ok(LinkOverride::Options(options)),
        }
    }
}

impl From<LinkOverride> for RawLinkOverride {
    fn from(value: LinkOverride) -> Self {
        match value {
            LinkOverride::Blocked => RawLinkOverride::Literal(BLOCKED_LINK.to_owned()),
            LinkOverride::Options(options) => RawLinkOverride::Options(options),
        }
    }
}

/// A link provided by a job without being declared in its release spec
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProviderDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub link_type: String,

    /// Property names exposed through the link
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
}

/// Declared variable (generation is handled outside the resolver)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,

    #[serde(rename = "type")]
    pub variable_type: String,

    #[serde(default, skip_serializing_if = "PropertyValue::is_null")]
    pub options: PropertyValue,
}

/// Fields computed for a job during resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResolution {
    /// One entry per replica × AZ
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instances: Vec<JobInstance>,

    /// Consumed links keyed by the spec-declared (non-aliased) name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub consumes: BTreeMap<String, Link>,

    /// Canonical process config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<BpmConfig>,
}

impl JobResolution {
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.consumes.is_empty() && self.bpm.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
name: cf
releases:
  - name: app
    version: "1.0"
    stemcell:
      os: ubuntu-jammy
  - name: db
stemcells:
  - alias: default
    os: ubuntu-bionic
instance_groups:
  - name: web
    instances: 2
    azs: [z1, z2]
    stemcell: default
    jobs:
      - name: server
        release: app
        properties:
          port: 8080
          keel:
            pre_render_scripts: ["echo hi"]
        consumes:
          database: { from: primary-db }
          cache: nil
        provides:
          http: { as: web-http }
  - name: db
    instances: 1
    lifecycle: errand
    jobs:
      - name: postgres
        release: db
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::load(MANIFEST).unwrap();

        assert_eq!(manifest.name, "cf");
        assert_eq!(manifest.instance_groups.len(), 2);
        assert!(!manifest.addons_applied);

        let web = manifest.instance_group("web").unwrap();
        assert_eq!(web.instances, 2);
        assert_eq!(web.azs, vec!["z1", "z2"]);
        assert!(!web.is_errand());

        let server = web.job("server").unwrap();
        assert_eq!(
            server.consumes.get("database"),
            Some(&LinkOverride::from_link("primary-db"))
        );
        assert!(server.consumes.get("cache").unwrap().is_blocked());
        assert_eq!(server.provides.get("http"), Some(&LinkOverride::alias("web-http")));
        assert_eq!(server.pre_render_scripts().unwrap(), vec!["echo hi"]);
        assert!(server.bpm_override().is_none());
        assert!(!server.is_addon());

        assert!(manifest.instance_group("db").unwrap().is_errand());
        assert_eq!(
            manifest.release("app").unwrap().stemcell.as_ref().unwrap().os,
            "ubuntu-jammy"
        );
    }

    #[test]
    fn test_invalid_link_override_literal() {
        let source = r#"
name: d
releases: [{ name: r }]
instance_groups:
  - name: g
    jobs:
      - name: j
        release: r
        consumes:
          db: maybe
"#;
        assert!(matches!(
            Manifest::from_yaml(source),
            Err(DescriptorError::Parse(_))
        ));
    }

    #[test]
    fn test_misspelled_link_option_is_rejected() {
        let source = r#"
name: d
releases: [{ name: r }]
instance_groups:
  - name: g
    jobs:
      - name: j
        release: r
        consumes:
          db: { form: primary-db }
"#;
        assert!(matches!(
            Manifest::from_yaml(source),
            Err(DescriptorError::Parse(_))
        ));

        let options: LinkOverride = serde_yaml::from_str("{ from: primary-db }").unwrap();
        assert_eq!(options, LinkOverride::from_link("primary-db"));
    }

    #[test]
    fn test_validate_rejects_undeclared_release() {
        let source = r#"
name: d
releases: [{ name: r }]
instance_groups:
  - name: g
    jobs:
      - { name: j, release: other }
"#;
        let err = Manifest::load(source).unwrap_err();
        assert!(matches!(err, DescriptorError::UndeclaredRelease { .. }));
    }

    #[test]
    fn test_validate_rejects_duplicate_groups() {
        let source = r#"
name: d
instance_groups:
  - { name: g }
  - { name: g }
"#;
        let err = Manifest::load(source).unwrap_err();
        assert!(matches!(err, DescriptorError::DuplicateInstanceGroup(name) if name == "g"));
    }

    #[test]
    fn test_resolution_is_not_deserialized() {
        let job: Job = serde_yaml::from_str("{ name: j, release: r }").unwrap();
        assert!(job.resolved.is_empty());
        assert!(job.addon.is_none());

        let yaml = serde_yaml::to_string(&job).unwrap();
        assert!(!yaml.contains("resolved"));
    }

    #[test]
    fn test_link_override_round_trips_blocked_literal() {
        let yaml = serde_yaml::to_string(&LinkOverride::Blocked).unwrap();
        assert_eq!(yaml.trim(), "nil");
    }
}
