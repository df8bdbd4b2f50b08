//! Process configs ("BPM")
//!
//! A [`BpmConfig`] lists the OS-level processes a job runs. Rendered configs
//! are parsed from the job's process config template; operator overrides use
//! the same shape. Every optional field distinguishes "unset" from "set", which
//! is what override merging relies on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Processes run by one job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpmConfig {
    #[serde(default)]
    pub processes: Vec<Process>,

    /// Set when instances of the job rendered different configs
    #[serde(default, skip_serializing_if = "is_false")]
    pub non_uniform: bool,
}

impl BpmConfig {
    pub fn new(processes: Vec<Process>) -> Self {
        Self {
            processes,
            non_uniform: false,
        }
    }

    pub fn from_yaml(source: &[u8]) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_slice(source)
    }

    pub fn process(&self, name: &str) -> Option<&Process> {
        self.processes.iter().find(|p| p.name == name)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One OS-level process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_disk: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_disk: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_volumes: Option<Vec<Volume>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Hooks>,

    #[serde(default, rename = "unsafe", skip_serializing_if = "Option::is_none")]
    pub unsafe_config: Option<Unsafe>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown_signal: Option<String>,
}

impl Process {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = Some(executable.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }
}

/// Resource limits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_files: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processes: Option<u64>,
}

/// Extra volume required by a process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub path: String,

    #[serde(default)]
    pub writable: bool,

    #[serde(default)]
    pub allow_executions: bool,

    #[serde(default)]
    pub mount_only: bool,
}

/// Lifecycle hooks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_start: Option<String>,
}

/// Privilege escalations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unsafe {
    #[serde(default)]
    pub privileged: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unrestricted_volumes: Vec<Volume>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rendered_config() {
        let config = BpmConfig::from_yaml(
            br#"
processes:
  - name: server
    executable: /var/vcap/packages/app/bin/server
    args: [--port, "8080"]
    env:
      MODE: production
    limits:
      memory: 1G
      open_files: 4096
    additional_volumes:
      - path: /var/vcap/data/app
        writable: true
    hooks:
      pre_start: /var/vcap/jobs/app/bin/pre-start
    unsafe:
      privileged: true
"#,
        )
        .unwrap();

        let server = config.process("server").unwrap();
        assert_eq!(server.args.as_ref().unwrap(), &vec!["--port", "8080"]);
        assert_eq!(server.limits.as_ref().unwrap().open_files, Some(4096));
        assert!(server.additional_volumes.as_ref().unwrap()[0].writable);
        assert!(server.unsafe_config.as_ref().unwrap().privileged);
        assert!(server.workdir.is_none());
        assert!(!config.non_uniform);
    }

    #[test]
    fn test_serialize_skips_unset_fields() {
        let config = BpmConfig::new(vec![Process::new("p").with_executable("/bin/p")]);
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("executable: /bin/p"));
        assert!(!yaml.contains("args"));
        assert!(!yaml.contains("non_uniform"));
    }
}
