//! Template rendering seam
//!
//! The resolver calls a [`TemplateRenderer`] once per job instance to produce
//! the process config. Rendering engines are supplied by the caller.

use keel_types::{JobInstance, Link, PropertyMap, PropertyValue};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a renderer
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// A template of a release job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRef {
    pub release: String,
    pub job: String,

    /// Template path relative to the job's `templates/` directory
    pub source: String,

    /// Path the rendered file is written to
    pub destination: String,

    /// Job directory, when the spec was loaded from disk
    pub job_dir: Option<PathBuf>,
}

impl TemplateRef {
    /// On-disk location of the template source
    pub fn source_path(&self) -> Option<PathBuf> {
        self.job_dir
            .as_ref()
            .map(|dir| dir.join("templates").join(&self.source))
    }
}

impl fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.release, self.job, self.source)
    }
}

/// Everything a template may read
#[derive(Debug, Clone, Copy)]
pub struct RenderInput<'a> {
    pub deployment: &'a str,
    pub instance_group: &'a str,
    pub job: &'a str,

    /// Spec defaults overlaid with job properties
    pub properties: &'a PropertyValue,

    /// Consumed links keyed by declared name
    pub links: &'a BTreeMap<String, Link>,

    pub instance: &'a JobInstance,
}

impl RenderInput<'_> {
    /// Property tree exposing the input under `p`, `spec` and `link`
    pub fn context(&self) -> PropertyValue {
        let mut spec = PropertyMap::new();
        spec.insert("deployment".into(), self.deployment.into());
        spec.insert("name".into(), self.instance_group.into());
        spec.insert("job".into(), self.job.into());
        spec.extend(instance_fields(self.instance));

        let links = self
            .links
            .iter()
            .map(|(name, link)| {
                let mut entry = PropertyMap::new();
                entry.insert("address".into(), link.address.as_str().into());
                entry.insert(
                    "instances".into(),
                    PropertyValue::List(
                        link.instances
                            .iter()
                            .map(|i| PropertyValue::Object(instance_fields(i)))
                            .collect(),
                    ),
                );
                entry.insert("properties".into(), link.properties.clone());
                (name.clone(), PropertyValue::Object(entry))
            })
            .collect::<PropertyMap>();

        let mut root = PropertyMap::new();
        root.insert("p".into(), self.properties.clone());
        root.insert("spec".into(), PropertyValue::Object(spec));
        root.insert("link".into(), PropertyValue::Object(links));
        PropertyValue::Object(root)
    }
}

fn instance_fields(instance: &JobInstance) -> PropertyMap {
    let mut fields = PropertyMap::new();
    fields.insert("index".into(), (instance.index as i64).into());
    fields.insert("instance".into(), (instance.instance as i64).into());
    fields.insert("az".into(), instance.az.as_str().into());
    fields.insert("id".into(), instance.id.as_str().into());
    fields.insert("address".into(), instance.address.as_str().into());
    fields.insert("bootstrap".into(), instance.bootstrap.into());
    fields
}

/// Renders job templates
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` for one instance
    fn render(&self, template: &TemplateRef, input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError>;
}

/// Renderer backed by a closure
pub struct FnTemplateRenderer<F> {
    render: F,
}

impl<F> FnTemplateRenderer<F>
where
    F: Fn(&TemplateRef, &RenderInput<'_>) -> Result<Vec<u8>, RenderError> + Send + Sync,
{
    pub fn new(render: F) -> Self {
        Self { render }
    }
}

impl<F> TemplateRenderer for FnTemplateRenderer<F>
where
    F: Fn(&TemplateRef, &RenderInput<'_>) -> Result<Vec<u8>, RenderError> + Send + Sync,
{
    fn render(&self, template: &TemplateRef, input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError> {
        (self.render)(template, input)
    }
}
