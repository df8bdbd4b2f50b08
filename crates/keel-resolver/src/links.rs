//! Link table construction and consumer resolution
//!
//! The table is built from every provider in the deployment, keyed by
//! `(type, name)`. Consumers then look their links up by the declared name or
//! by the name given in their `from:` override.

use crate::addressing::InstanceAddresser;
use crate::error::{ResolveError, Result};
use crate::provider::JobSpecs;
use keel_types::{
    InstanceGroup, Job, JobInstance, JobSpec, Link, LinkOverride, Manifest, PropertyValue,
    ProvidesSpec,
};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Key of a provided link
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkKey {
    pub link_type: String,
    pub name: String,
}

impl LinkKey {
    pub fn new(link_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            link_type: link_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for LinkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.link_type, self.name)
    }
}

/// Every link provided in a deployment
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    links: BTreeMap<LinkKey, Link>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn lookup(&self, link_type: &str, name: &str) -> Option<&Link> {
        self.links.get(&LinkKey::new(link_type, name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LinkKey, &Link)> {
        self.links.iter()
    }

    /// Insert a link under `key`.
    ///
    /// A second provider for the same key is an error, unless it comes from an
    /// add-on; then the first provider is kept.
    pub fn insert(&mut self, key: LinkKey, link: Link, group: &str, job: &Job) -> Result<()> {
        if self.links.contains_key(&key) {
            if job.is_addon() {
                debug!(
                    link = %key,
                    instance_group = %group,
                    job = %job.name,
                    "Ignoring duplicate link provided by add-on job"
                );
                return Ok(());
            }
            return Err(ResolveError::DuplicateProvider {
                instance_group: group.to_owned(),
                job: job.name.clone(),
                link: key.name,
                link_type: key.link_type,
            });
        }
        self.links.insert(key, link);
        Ok(())
    }

    /// Register every link `job` provides
    pub fn add_provider(
        &mut self,
        group: &InstanceGroup,
        job: &Job,
        spec: &JobSpec,
        instances: &[JobInstance],
        address: &str,
    ) -> Result<()> {
        for provides in provided_links(job, spec) {
            let name = match job.provides.get(&provides.name) {
                Some(LinkOverride::Blocked) => {
                    debug!(link = %provides.name, job = %job.name, "Provided link blocked");
                    continue;
                }
                Some(LinkOverride::Options(options)) => {
                    options.alias.clone().unwrap_or_else(|| provides.name.clone())
                }
                None => provides.name.clone(),
            };

            let link = Link {
                address: address.to_owned(),
                instances: instances.to_vec(),
                properties: provider_properties(job, spec, &provides.properties),
            };
            self.insert(LinkKey::new(&provides.link_type, name), link, &group.name, job)?;
        }
        Ok(())
    }
}

/// Links declared by the spec followed by the job's custom definitions
fn provided_links(job: &Job, spec: &JobSpec) -> Vec<ProvidesSpec> {
    spec.provides
        .iter()
        .cloned()
        .chain(job.custom_provider_definitions.iter().map(|custom| {
            ProvidesSpec::new(&custom.name, &custom.link_type)
                .with_properties(custom.properties.iter().cloned())
        }))
        .collect()
}

/// Property tree exposed through a link: spec defaults, then explicit job values
pub fn provider_properties(job: &Job, spec: &JobSpec, names: &[String]) -> PropertyValue {
    let mut properties = PropertyValue::object();
    for name in names {
        properties.set_path(name, spec.property_default(name));
        if let Some(value) = job.properties.get_path(name) {
            properties.set_path(name, value.clone());
        }
    }
    properties
}

/// Build the table from every job of every instance group
pub fn build_link_table(
    manifest: &Manifest,
    specs: &JobSpecs,
    addresser: &InstanceAddresser<'_>,
) -> Result<LinkTable> {
    let mut table = LinkTable::new();
    for group in &manifest.instance_groups {
        let address = addresser.group_address(&group.name);
        for job in &group.jobs {
            let spec = specs.require(&job.release, &job.name)?;
            if spec.provides.is_empty() && job.custom_provider_definitions.is_empty() {
                continue;
            }
            let instances = addresser.job_instances(group, &job.name)?;
            table.add_provider(group, job, spec, &instances, &address)?;
        }
    }
    debug!(deployment = %manifest.name, links = table.len(), "Link table built");
    Ok(table)
}

/// Links consumed by `job`, keyed by their declared name
pub fn resolve_consumers(
    group: &str,
    job: &Job,
    spec: &JobSpec,
    table: &LinkTable,
) -> Result<BTreeMap<String, Link>> {
    let mut resolved = BTreeMap::new();
    for consumes in &spec.consumes {
        let name = match job.consumes.get(&consumes.name) {
            Some(LinkOverride::Blocked) => {
                debug!(link = %consumes.name, job = %job.name, "Consumed link blocked");
                continue;
            }
            Some(LinkOverride::Options(options)) => {
                options.from.as_deref().unwrap_or(&consumes.name)
            }
            None => consumes.name.as_str(),
        };

        match table.lookup(&consumes.link_type, name) {
            Some(link) => {
                resolved.insert(consumes.name.clone(), link.clone());
            }
            None if consumes.optional => {
                debug!(link = %name, job = %job.name, "Optional link has no provider");
            }
            None => {
                return Err(ResolveError::MissingLink {
                    instance_group: group.to_owned(),
                    job: job.name.clone(),
                    link: name.to_owned(),
                    link_type: consumes.link_type.clone(),
                });
            }
        }
    }
    Ok(resolved)
}
