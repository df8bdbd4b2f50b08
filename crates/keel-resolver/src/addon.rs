//! Add-on placement
//!
//! Placement rules are turned into tagged [`PlacementPredicate`]s, one per
//! non-empty rule category, and OR-combined. An add-on attaches to a group
//! when its `include` rules match and its `exclude` rules do not.

use crate::error::{ResolveError, Result};
use keel_types::{Addon, InstanceGroup, Job, JobRule, Manifest, PlacementRules, StemcellRule};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure to resolve the operating system a job runs on
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OsLookupError {
    #[error("job {job} references unknown release {release}")]
    UnknownRelease { job: String, release: String },

    #[error("stemcell alias {alias} is not declared")]
    UnknownStemcell { alias: String },

    #[error("no stemcell operating system found for job {job}")]
    Unresolvable { job: String },
}

/// One rule category
#[derive(Debug, Clone, Copy)]
pub enum PlacementPredicate<'a> {
    /// Group runs a job on one of these operating systems
    OperatingSystem(&'a [StemcellRule]),
    /// Group runs one of these (release, job) pairs
    Job(&'a [JobRule]),
    /// Group has one of these names
    InstanceGroup(&'a [String]),
}

impl<'a> PlacementPredicate<'a> {
    /// Predicates for the non-empty categories of a rule set
    pub fn from_rules(rules: &'a PlacementRules) -> Vec<Self> {
        let mut predicates = Vec::new();
        if !rules.stemcell.is_empty() {
            predicates.push(PlacementPredicate::OperatingSystem(&rules.stemcell));
        }
        if !rules.jobs.is_empty() {
            predicates.push(PlacementPredicate::Job(&rules.jobs));
        }
        if !rules.instance_groups.is_empty() {
            predicates.push(PlacementPredicate::InstanceGroup(&rules.instance_groups));
        }
        predicates
    }

    pub fn matches(
        &self,
        manifest: &Manifest,
        group: &InstanceGroup,
    ) -> std::result::Result<bool, OsLookupError> {
        match self {
            PlacementPredicate::OperatingSystem(rules) => {
                for job in &group.jobs {
                    let os = job_operating_system(manifest, group, job)?;
                    if rules.iter().any(|rule| rule.os == os) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            PlacementPredicate::Job(rules) => Ok(group.jobs.iter().any(|job| {
                rules
                    .iter()
                    .any(|rule| rule.name == job.name && rule.release == job.release)
            })),
            PlacementPredicate::InstanceGroup(names) => {
                Ok(names.iter().any(|name| *name == group.name))
            }
        }
    }
}

/// Whether any category of `rules` matches `group`
pub fn placement_matches(
    manifest: &Manifest,
    group: &InstanceGroup,
    rules: &PlacementRules,
) -> std::result::Result<bool, OsLookupError> {
    for predicate in PlacementPredicate::from_rules(rules) {
        if predicate.matches(manifest, group)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Operating system a job runs on.
///
/// The release's compiled stemcell wins; otherwise the group's stemcell alias
/// is looked up in the descriptor's stemcell table.
pub fn job_operating_system<'a>(
    manifest: &'a Manifest,
    group: &'a InstanceGroup,
    job: &Job,
) -> std::result::Result<&'a str, OsLookupError> {
    let release = manifest
        .release(&job.release)
        .ok_or_else(|| OsLookupError::UnknownRelease {
            job: job.name.clone(),
            release: job.release.clone(),
        })?;

    if let Some(stemcell) = &release.stemcell {
        return Ok(&stemcell.os);
    }

    let alias = group
        .stemcell
        .as_deref()
        .ok_or_else(|| OsLookupError::Unresolvable {
            job: job.name.clone(),
        })?;
    let stemcell = manifest
        .stemcell(alias)
        .ok_or_else(|| OsLookupError::UnknownStemcell {
            alias: alias.to_owned(),
        })?;
    stemcell.os.as_deref().ok_or_else(|| OsLookupError::Unresolvable {
        job: job.name.clone(),
    })
}

/// Whether `addon` attaches to `group`
pub fn addon_applies(manifest: &Manifest, group: &InstanceGroup, addon: &Addon) -> Result<bool> {
    let wrap = |source| ResolveError::AddonMatch {
        addon: addon.name.clone(),
        instance_group: group.name.clone(),
        source,
    };

    let included = match &addon.include {
        Some(rules) => placement_matches(manifest, group, rules).map_err(wrap)?,
        None => true,
    };
    if !included {
        return Ok(false);
    }

    let excluded = match &addon.exclude {
        Some(rules) => placement_matches(manifest, group, rules).map_err(wrap)?,
        None => false,
    };
    Ok(!excluded)
}

/// Append add-on jobs to every matching instance group.
///
/// Runs once per descriptor; later calls are no-ops.
pub fn apply_addons(manifest: &mut Manifest) -> Result<()> {
    if manifest.addons_applied {
        return Ok(());
    }

    let mut placements = Vec::new();
    for (addon_index, addon) in manifest.addons.iter().enumerate() {
        for (group_index, group) in manifest.instance_groups.iter().enumerate() {
            if addon_applies(manifest, group, addon)? {
                placements.push((addon_index, group_index));
            } else {
                debug!(addon = %addon.name, instance_group = %group.name, "Add-on not placed");
            }
        }
    }

    for (addon_index, group_index) in placements {
        let addon = &manifest.addons[addon_index];
        let group = &mut manifest.instance_groups[group_index];
        for addon_job in &addon.jobs {
            if group.job(&addon_job.name).is_some() {
                warn!(
                    addon = %addon.name,
                    instance_group = %group.name,
                    job = %addon_job.name,
                    "Instance group already runs add-on job, skipping"
                );
                continue;
            }
            group.jobs.push(addon_job.to_job(&addon.name));
        }
        info!(addon = %addon.name, instance_group = %group.name, jobs = addon.jobs.len(), "Add-on applied");
    }

    manifest.addons_applied = true;
    Ok(())
}
