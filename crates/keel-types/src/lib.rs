//! Keel Types - Deployment descriptor model
//!
//! Passive data structures shared by the resolver and its callers:
//!
//! - **Manifest**: the deployment descriptor (instance groups, jobs, releases,
//!   stemcells, add-ons, variables)
//! - **PropertyValue**: tagged property trees with dotted-path access
//! - **JobSpec**: the provides/consumes contract and templates of a release job
//! - **JobInstance** / **Link**: computed identities and resolved links
//! - **BpmConfig**: per-job process configuration
//!
//! The descriptor is parsed once per resolution run and annotated in place;
//! resolution results land in each job's [`JobResolution`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod addon;
pub mod bpm;
pub mod error;
pub mod instance;
pub mod link;
pub mod manifest;
pub mod property;
pub mod release;

// Re-export main types
pub use addon::{Addon, AddonJob, JobRule, PlacementRules, StemcellRule};
pub use bpm::{BpmConfig, Hooks, Limits, Process, Unsafe, Volume};
pub use error::{DescriptorError, Result};
pub use instance::JobInstance;
pub use link::Link;
pub use manifest::{
    CustomProviderDefinition, InstanceGroup, Job, JobResolution, Lifecycle, LinkOptions,
    LinkOverride, Manifest, Network, Release, ReleaseStemcell, Stemcell, Variable,
    BLOCKED_LINK, BPM_OVERRIDE_PATH, PRE_RENDER_SCRIPTS_PATH,
};
pub use property::{PropertyMap, PropertyValue};
pub use release::{ConsumesSpec, JobSpec, PropertyDefinition, ProvidesSpec};
