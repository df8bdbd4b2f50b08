//! Release job specs
//!
//! Each release ships one spec per job describing the links it provides and
//! consumes, its property definitions and the templates it renders.

use crate::property::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Contract of a single release job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Template source → destination
    #[serde(default)]
    pub templates: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,

    #[serde(default)]
    pub consumes: Vec<ConsumesSpec>,

    #[serde(default)]
    pub provides: Vec<ProvidesSpec>,

    /// Property definitions keyed by dotted name
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyDefinition>,

    /// Directory the spec was loaded from, when it came from disk
    #[serde(skip)]
    pub location: Option<PathBuf>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(source)
    }

    pub fn with_template(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.templates.insert(source.into(), destination.into());
        self
    }

    pub fn with_provides(mut self, provides: ProvidesSpec) -> Self {
        self.provides.push(provides);
        self
    }

    pub fn with_consumes(mut self, consumes: ConsumesSpec) -> Self {
        self.consumes.push(consumes);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, default: PropertyValue) -> Self {
        self.properties.insert(
            name.into(),
            PropertyDefinition {
                default,
                ..Default::default()
            },
        );
        self
    }

    /// Default value declared for a property; null when none is declared
    pub fn property_default(&self, name: &str) -> PropertyValue {
        self.properties
            .get(name)
            .map(|definition| definition.default.clone())
            .unwrap_or_default()
    }

    /// All property defaults expanded into a nested tree
    pub fn default_properties(&self) -> PropertyValue {
        PropertyValue::from_dotted(
            self.properties
                .iter()
                .map(|(name, definition)| (name, definition.default.clone())),
        )
    }

    /// Template (source, destination) rendered to the given destination
    pub fn template_for_destination(&self, destination: &str) -> Option<(&str, &str)> {
        self.templates
            .iter()
            .find(|(_, dst)| dst.as_str() == destination)
            .map(|(src, dst)| (src.as_str(), dst.as_str()))
    }
}

/// A link a job offers to other jobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidesSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub link_type: String,

    /// Property names exposed through the link
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
}

impl ProvidesSpec {
    pub fn new(name: impl Into<String>, link_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link_type: link_type.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.properties.extend(properties.into_iter().map(Into::into));
        self
    }
}

/// A link a job depends on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumesSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub link_type: String,

    #[serde(default)]
    pub optional: bool,
}

impl ConsumesSpec {
    pub fn new(name: impl Into<String>, link_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link_type: link_type.into(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Property definition in a job spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "PropertyValue::is_null")]
    pub default: PropertyValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
name: postgres
templates:
  bpm.yml.erb: config/bpm.yml
  pg.conf.erb: config/pg.conf
packages: [postgres]
provides:
  - name: database
    type: pg
    properties: [port, tls.enabled]
consumes:
  - name: backup
    type: s3
    optional: true
properties:
  port:
    description: listen port
    default: 5432
  tls.enabled:
    default: false
  password:
    description: no default
"#;

    #[test]
    fn test_parse_job_spec() {
        let spec = JobSpec::from_yaml(SPEC).unwrap();

        assert_eq!(spec.name, "postgres");
        assert_eq!(spec.provides[0].link_type, "pg");
        assert_eq!(spec.provides[0].properties, vec!["port", "tls.enabled"]);
        assert!(spec.consumes[0].optional);
        assert_eq!(spec.property_default("port"), PropertyValue::Integer(5432));
        assert!(spec.property_default("password").is_null());
        assert!(spec.property_default("undeclared").is_null());
        assert!(spec.location.is_none());
    }

    #[test]
    fn test_default_properties_expand_dotted_names() {
        let spec = JobSpec::from_yaml(SPEC).unwrap();
        let defaults = spec.default_properties();

        assert_eq!(defaults.get_path("tls.enabled"), Some(&PropertyValue::Bool(false)));
        assert_eq!(defaults.get_path("port"), Some(&PropertyValue::Integer(5432)));
    }

    #[test]
    fn test_template_for_destination() {
        let spec = JobSpec::from_yaml(SPEC).unwrap();
        assert_eq!(
            spec.template_for_destination("config/bpm.yml"),
            Some(("bpm.yml.erb", "config/bpm.yml"))
        );
        assert!(spec.template_for_destination("config/missing.yml").is_none());
    }
}
