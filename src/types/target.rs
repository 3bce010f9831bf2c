// ABOUTME: Execution target for an environment: local path or remote host+path.
// ABOUTME: Resolved from tier bindings in config; consumed by RemoteExecutor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where an environment lives and where its commands run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Target {
    /// A directory on the control machine.
    Local { root: PathBuf },
    /// A directory on a remote host reached over SSH.
    Remote {
        host: String,
        #[serde(default = "default_ssh_port")]
        port: u16,
        #[serde(default)]
        user: Option<String>,
        root: PathBuf,
    },
}

fn default_ssh_port() -> u16 {
    22
}

impl Target {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Target::Local { root: root.into() }
    }

    /// The environment root directory on the target machine.
    pub fn root(&self) -> &Path {
        match self {
            Target::Local { root } => root,
            Target::Remote { root, .. } => root,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Target::Remote { .. })
    }

    /// The root rendered for use inside shell command templates.
    pub fn root_str(&self) -> String {
        self.root().display().to_string()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Local { root } => write!(f, "local:{}", root.display()),
            Target::Remote { host, root, .. } => write!(f, "{}:{}", host, root.display()),
        }
    }
}
