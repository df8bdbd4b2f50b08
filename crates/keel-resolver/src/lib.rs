//! Keel Resolver - Deployment descriptor resolution
//!
//! Turns a parsed [`keel_types::Manifest`] into fully resolved instance
//! groups ready for resource generation:
//!
//! - **Add-on placement**: attach cross-cutting jobs to matching groups
//! - **Addressing**: stable per-instance ids and DNS addresses
//! - **Links**: deployment-wide provider table and consumer resolution
//! - **Process configs**: per-instance rendering, divergence detection and
//!   operator overrides
//!
//! Release specs, template rendering and pre-render hooks are supplied by the
//! caller through the [`ReleaseSpecProvider`], [`TemplateRenderer`] and
//! [`HookRunner`] traits.
//!
//! # Example
//!
//! ```ignore
//! use keel_resolver::{PipelineBuilder, ResolverConfig, DirectoryReleaseSpecProvider};
//!
//! let pipeline = PipelineBuilder::new()
//!     .with_config(ResolverConfig::new("prod"))
//!     .with_spec_provider(Arc::new(DirectoryReleaseSpecProvider::new("releases")))
//!     .with_renderer(renderer)
//!     .build()?;
//!
//! let resolved = pipeline.resolve(&manifest, "web")?;
//! ```

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod addon;
pub mod addressing;
pub mod bpm;
pub mod builder;
pub mod config;
pub mod error;
pub mod hooks;
pub mod links;
pub mod pipeline;
pub mod provider;
pub mod render;

pub use addon::{
    addon_applies, apply_addons, job_operating_system, placement_matches, OsLookupError,
    PlacementPredicate,
};
pub use addressing::{dns_label, InstanceAddresser};
pub use bpm::{is_uniform, merge_processes, parse_override, BpmResolver};
pub use builder::PipelineBuilder;
pub use config::{ResolverConfig, DEFAULT_BPM_DESTINATION};
pub use error::{BuildError, ErrorKind, PipelineError, ResolveError, Result};
pub use hooks::{CommandHookRunner, HookError, HookRunner, NoopHookRunner, PreRenderHook};
pub use links::{build_link_table, provider_properties, resolve_consumers, LinkKey, LinkTable};
pub use pipeline::{BpmConfigSet, Pipeline, ResolvedInstanceGroup, Stage};
pub use provider::{
    DirectoryReleaseSpecProvider, InMemoryReleaseSpecProvider, JobSpecs, ProviderError,
    ReleaseSpecProvider,
};
pub use render::{FnTemplateRenderer, RenderError, RenderInput, TemplateRef, TemplateRenderer};
