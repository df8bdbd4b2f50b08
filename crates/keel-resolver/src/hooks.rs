//! Pre-render hooks
//!
//! Jobs may declare scripts under `keel.pre_render_scripts` that run before
//! any template is rendered for their instance group.

use std::process::Command;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while running hooks
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Invalid hook declaration: {0}")]
    InvalidDeclaration(String),

    #[error("Failed to start script {script:?}: {source}")]
    Spawn {
        script: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Script {script:?} exited with {status}: {stderr}")]
    Failed {
        script: String,
        status: String,
        stderr: String,
    },
}

/// Scripts declared by one job
#[derive(Debug, Clone, Copy)]
pub struct PreRenderHook<'a> {
    pub deployment: &'a str,
    pub instance_group: &'a str,
    pub job: &'a str,
    pub scripts: &'a [String],
}

/// Runs pre-render hooks
pub trait HookRunner: Send + Sync {
    fn run(&self, hook: &PreRenderHook<'_>) -> Result<(), HookError>;
}

/// Hook runner that skips every script
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHookRunner;

impl HookRunner for NoopHookRunner {
    fn run(&self, hook: &PreRenderHook<'_>) -> Result<(), HookError> {
        debug!(
            instance_group = %hook.instance_group,
            job = %hook.job,
            scripts = hook.scripts.len(),
            "Skipping pre-render hooks"
        );
        Ok(())
    }
}

/// Hook runner executing each script through a shell
#[derive(Debug, Clone)]
pub struct CommandHookRunner {
    shell: String,
}

impl Default for CommandHookRunner {
    fn default() -> Self {
        Self { shell: "sh".into() }
    }
}

impl CommandHookRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }
}

impl HookRunner for CommandHookRunner {
    fn run(&self, hook: &PreRenderHook<'_>) -> Result<(), HookError> {
        for script in hook.scripts {
            info!(instance_group = %hook.instance_group, job = %hook.job, script = %script, "Running pre-render hook");

            let output = Command::new(&self.shell)
                .arg("-c")
                .arg(script)
                .env("KEEL_DEPLOYMENT", hook.deployment)
                .env("KEEL_INSTANCE_GROUP", hook.instance_group)
                .env("KEEL_JOB", hook.job)
                .output()
                .map_err(|source| HookError::Spawn {
                    script: script.clone(),
                    source,
                })?;

            if !output.status.success() {
                return Err(HookError::Failed {
                    script: script.clone(),
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hook(scripts: &[String]) -> PreRenderHook<'_> {
        PreRenderHook {
            deployment: "d",
            instance_group: "web",
            job: "server",
            scripts,
        }
    }

    #[test]
    fn test_noop_runner() {
        let scripts = vec!["exit 1".to_string()];
        assert!(NoopHookRunner.run(&hook(&scripts)).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runner_exposes_environment() {
        let scripts = vec![
            r#"test "$KEEL_INSTANCE_GROUP" = web && test "$KEEL_JOB" = server && test "$KEEL_DEPLOYMENT" = d"#
                .to_string(),
        ];
        assert!(CommandHookRunner::new().run(&hook(&scripts)).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_runner_stops_on_failure() {
        let scripts = vec!["echo boom >&2; exit 3".to_string(), "true".to_string()];
        let err = CommandHookRunner::new().run(&hook(&scripts)).unwrap_err();
        match err {
            HookError::Failed { script, stderr, .. } => {
                assert!(script.starts_with("echo boom"));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
