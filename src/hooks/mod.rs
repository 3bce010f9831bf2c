// ABOUTME: Hooks system for transition lifecycle events.
// ABOUTME: Discovers and executes shell scripts at pre-transition, post-transition, and on-error points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::types::{SiteName, Tier};

/// Hook execution points in the transition lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before the transition starts. Failure aborts the run.
    PreTransition,
    /// After a successful transition. Failure logs a warning.
    PostTransition,
    /// On transition failure. Failure logs a warning.
    OnError,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreTransition => "pre-transition",
            HookPoint::PostTransition => "post-transition",
            HookPoint::OnError => "on-error",
        }
    }

    /// Whether failure at this hook point should abort the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreTransition)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub site: SiteName,
    pub transition: String,
    pub source_tier: Option<Tier>,
    pub dest_tier: Tier,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("TERRACE_SITE".to_string(), self.site.to_string());
        env.insert("TERRACE_TRANSITION".to_string(), self.transition.clone());
        env.insert("TERRACE_DEST_TIER".to_string(), self.dest_tier.to_string());
        if let Some(source) = self.source_tier {
            env.insert("TERRACE_SOURCE_TIER".to_string(), source.to_string());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Create a new hook runner looking for hooks in the given project directory.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            hooks_dir: project_dir.join(".terrace").join("hooks"),
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let env_vars = context.to_env();

        let output = Command::new(&hook_path)
            .envs(&env_vars)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!("{} hook completed successfully", point.filename());
                } else {
                    tracing::warn!(
                        "{} hook failed with exit code {:?}",
                        point.filename(),
                        result.exit_code
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_point_filenames() {
        assert_eq!(HookPoint::PreTransition.filename(), "pre-transition");
        assert_eq!(HookPoint::PostTransition.filename(), "post-transition");
        assert_eq!(HookPoint::OnError.filename(), "on-error");
    }

    #[test]
    fn pre_transition_is_fatal() {
        assert!(HookPoint::PreTransition.is_fatal());
        assert!(!HookPoint::PostTransition.is_fatal());
        assert!(!HookPoint::OnError.is_fatal());
    }

    #[test]
    fn hook_context_to_env() {
        let context = HookContext {
            site: SiteName::new("myapp").unwrap(),
            transition: "stg2prod".to_string(),
            source_tier: Some(Tier::Stg),
            dest_tier: Tier::Prod,
        };

        let env = context.to_env();
        assert_eq!(env.get("TERRACE_SITE"), Some(&"myapp".to_string()));
        assert_eq!(env.get("TERRACE_TRANSITION"), Some(&"stg2prod".to_string()));
        assert_eq!(env.get("TERRACE_SOURCE_TIER"), Some(&"stg".to_string()));
        assert_eq!(env.get("TERRACE_DEST_TIER"), Some(&"prod".to_string()));
    }

    #[test]
    fn hook_context_without_source_tier() {
        let context = HookContext {
            site: SiteName::new("myapp").unwrap(),
            transition: "provision_live".to_string(),
            source_tier: None,
            dest_tier: Tier::Live,
        };

        let env = context.to_env();
        assert!(!env.contains_key("TERRACE_SOURCE_TIER"));
    }

    #[test]
    fn hook_runner_checks_hooks_dir() {
        let runner = HookRunner::new(Path::new("/nonexistent"));
        assert!(!runner.hook_exists(HookPoint::PreTransition));
    }
}
