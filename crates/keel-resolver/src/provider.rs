//! Release job spec lookup
//!
//! The resolver never reads release archives itself; it asks a
//! [`ReleaseSpecProvider`] for the spec of each `(release, job)` pair. Specs
//! are fetched once per run into a [`JobSpecs`] snapshot.

use crate::error::{ResolveError, Result};
use dashmap::DashMap;
use keel_types::{JobSpec, Manifest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File names a job spec is looked up under, in order
const SPEC_FILE_NAMES: [&str; 2] = ["spec", "job.MF"];

/// Errors raised by a spec provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No spec for job {job} in release {release}")]
    NotFound { release: String, job: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Spec at {} is for job {found}, expected {expected}", .path.display())]
    NameMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

/// Source of release job specs
pub trait ReleaseSpecProvider: Send + Sync {
    /// Spec of `job` in `release`
    fn job_spec(&self, release: &str, job: &str) -> std::result::Result<JobSpec, ProviderError>;
}

/// Spec provider backed by an in-memory map
#[derive(Debug, Default)]
pub struct InMemoryReleaseSpecProvider {
    specs: DashMap<(String, String), JobSpec>,
}

impl InMemoryReleaseSpecProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec under its own job name
    pub fn register(&self, release: impl Into<String>, spec: JobSpec) {
        self.specs.insert((release.into(), spec.name.clone()), spec);
    }

    pub fn with_spec(self, release: impl Into<String>, spec: JobSpec) -> Self {
        self.register(release, spec);
        self
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl ReleaseSpecProvider for InMemoryReleaseSpecProvider {
    fn job_spec(&self, release: &str, job: &str) -> std::result::Result<JobSpec, ProviderError> {
        self.specs
            .get(&(release.to_owned(), job.to_owned()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ProviderError::NotFound {
                release: release.to_owned(),
                job: job.to_owned(),
            })
    }
}

/// Spec provider reading the release source layout `<root>/<release>/jobs/<job>/spec`
#[derive(Debug, Clone)]
pub struct DirectoryReleaseSpecProvider {
    root: PathBuf,
}

impl DirectoryReleaseSpecProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a job's spec and templates
    pub fn job_dir(&self, release: &str, job: &str) -> PathBuf {
        self.root.join(release).join("jobs").join(job)
    }
}

impl ReleaseSpecProvider for DirectoryReleaseSpecProvider {
    fn job_spec(&self, release: &str, job: &str) -> std::result::Result<JobSpec, ProviderError> {
        let dir = self.job_dir(release, job);
        let path = SPEC_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
            .ok_or_else(|| ProviderError::NotFound {
                release: release.to_owned(),
                job: job.to_owned(),
            })?;

        let source = std::fs::read_to_string(&path).map_err(|source| ProviderError::Io {
            path: path.clone(),
            source,
        })?;
        let mut spec = JobSpec::from_yaml(&source).map_err(|source| ProviderError::Parse {
            path: path.clone(),
            source,
        })?;

        if spec.name != job {
            return Err(ProviderError::NameMismatch {
                path,
                expected: job.to_owned(),
                found: spec.name,
            });
        }

        debug!(release = %release, job = %job, path = %path.display(), "Loaded job spec");
        spec.location = Some(dir);
        Ok(spec)
    }
}

/// Specs of every job in a descriptor, fetched once per run
#[derive(Debug, Default, Clone)]
pub struct JobSpecs {
    specs: HashMap<(String, String), JobSpec>,
}

impl JobSpecs {
    /// Fetch the spec of every job placed in any instance group
    pub fn fetch(manifest: &Manifest, provider: &dyn ReleaseSpecProvider) -> Result<Self> {
        let mut specs = HashMap::new();
        for job in manifest.instance_groups.iter().flat_map(|g| &g.jobs) {
            let key = (job.release.clone(), job.name.clone());
            if specs.contains_key(&key) {
                continue;
            }
            let spec = provider
                .job_spec(&job.release, &job.name)
                .map_err(|source| ResolveError::ReleaseLookup {
                    release: job.release.clone(),
                    job: job.name.clone(),
                    source,
                })?;
            specs.insert(key, spec);
        }
        Ok(Self { specs })
    }

    pub fn get(&self, release: &str, job: &str) -> Option<&JobSpec> {
        self.specs.get(&(release.to_owned(), job.to_owned()))
    }

    /// Spec of a job, failing with a release lookup error if it was never fetched
    pub fn require(&self, release: &str, job: &str) -> Result<&JobSpec> {
        self.get(release, job).ok_or_else(|| ResolveError::ReleaseLookup {
            release: release.to_owned(),
            job: job.to_owned(),
            source: ProviderError::NotFound {
                release: release.to_owned(),
                job: job.to_owned(),
            },
        })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use keel_types::{InstanceGroup, Job, ProvidesSpec};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_provider() {
        let provider =
            InMemoryReleaseSpecProvider::new().with_spec("app", JobSpec::new("server"));

        assert_eq!(provider.len(), 1);
        assert_eq!(provider.job_spec("app", "server").unwrap().name, "server");
        assert!(matches!(
            provider.job_spec("app", "worker"),
            Err(ProviderError::NotFound { .. })
        ));
        assert!(provider.job_spec("other", "server").is_err());
    }

    #[test]
    fn test_directory_provider_reads_spec() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("app/jobs/server");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("spec"),
            "name: server\ntemplates:\n  bpm.yml: config/bpm.yml\nprovides:\n  - { name: http, type: http }\n",
        )
        .unwrap();

        let provider = DirectoryReleaseSpecProvider::new(root.path());
        let spec = provider.job_spec("app", "server").unwrap();

        assert_eq!(spec.provides, vec![ProvidesSpec::new("http", "http")]);
        assert_eq!(spec.location.as_deref(), Some(dir.as_path()));
    }

    #[test]
    fn test_directory_provider_errors() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("app/jobs/server");
        fs::create_dir_all(&dir).unwrap();
        let provider = DirectoryReleaseSpecProvider::new(root.path());

        assert!(matches!(
            provider.job_spec("app", "server"),
            Err(ProviderError::NotFound { .. })
        ));

        fs::write(dir.join("spec"), "name: [unterminated").unwrap();
        assert!(matches!(
            provider.job_spec("app", "server"),
            Err(ProviderError::Parse { .. })
        ));

        fs::write(dir.join("spec"), "name: worker").unwrap();
        assert!(matches!(
            provider.job_spec("app", "server"),
            Err(ProviderError::NameMismatch { .. })
        ));
    }

    #[test]
    fn test_fetch_reports_missing_spec() {
        let manifest = Manifest {
            name: "d".into(),
            instance_groups: vec![InstanceGroup {
                name: "g".into(),
                jobs: vec![Job::new("missing", "app")],
                ..Default::default()
            }],
            ..Default::default()
        };
        let provider = InMemoryReleaseSpecProvider::new();

        let err = JobSpecs::fetch(&manifest, &provider).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReleaseLookupFailure);
    }
}
