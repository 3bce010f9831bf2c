// ABOUTME: Shared test scaffolding: configs, site layouts, and instrumented executors.
// ABOUTME: Everything runs against local tempdir targets; no network involved.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use terrace::config::Config;
use terrace::exec::{ExecError, ExecOutput, LocalExecutor, RemoteExecutor};
use terrace::provision::{ProvisionError, Provisioner, ServerSpec};
use terrace::types::{ServerRef, SiteName, Target};

pub const SITE: &str = "demo";

pub fn site() -> SiteName {
    SiteName::new(SITE).unwrap()
}

/// Config with all four tiers bound to local directories under `roots`,
/// state under `state`, and a DNS wait that expires immediately (non-fatal).
pub fn test_config(roots: &Path, state: &Path) -> Config {
    let yaml = format!(
        r#"
state_dir: {state}
sites:
  {SITE}:
    tiers:
      dev:
        root: {roots}/dev
        domain: dev.demo.invalid
      stg:
        root: {roots}/stg
        domain: stg.demo.invalid
      live:
        root: {roots}/live
        domain: live.demo.invalid
      prod:
        root: {roots}/prod
        domain: demo.invalid
policy:
  dns_timeout: 0s
  provision_backoff: 1ms
"#,
        state = state.display(),
        roots = roots.display(),
    );
    Config::from_yaml(&yaml).unwrap()
}

/// A hand-managed source tier: a root with a plain `current` directory.
pub fn scaffold_source(root: &Path) {
    let current = root.join("current");
    std::fs::create_dir_all(&current).unwrap();
    std::fs::write(current.join("index.html"), "<h1>hello</h1>\n").unwrap();
    std::fs::write(current.join("app.css"), "body{}\n").unwrap();
}

/// The slot layout InitSlots would create.
pub fn init_slot_layout(root: &Path) {
    for slot in ["slot-a", "slot-b", "slot-c"] {
        std::fs::create_dir_all(root.join("releases").join(slot)).unwrap();
    }
    for (alias, slot) in [
        ("current", "releases/slot-a"),
        ("staged", "releases/slot-b"),
        ("previous", "releases/slot-c"),
    ] {
        std::os::unix::fs::symlink(slot, root.join(alias)).unwrap();
    }
}

/// Put servable content (with the release marker) into the staged slot.
pub fn stamp_staged(root: &Path) {
    std::fs::write(root.join("staged").join("index.html"), "<h1>v2</h1>\n").unwrap();
    std::fs::write(root.join("staged").join(".release"), "test-release\n").unwrap();
}

/// Raw alias targets, for asserting mappings byte-for-byte.
pub fn read_links(root: &Path) -> (String, String, String) {
    let link = |alias: &str| {
        std::fs::read_link(root.join(alias))
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "MISSING".to_string())
    };
    (link("current"), link("staged"), link("previous"))
}

/// Fails the first `failures` commands containing `pattern`, passing
/// everything else through to a real LocalExecutor.
pub struct FailingExecutor {
    inner: LocalExecutor,
    pattern: String,
    failures_left: AtomicUsize,
}

impl FailingExecutor {
    pub fn new(pattern: &str, failures: usize) -> Self {
        Self {
            inner: LocalExecutor::new(),
            pattern: pattern.to_string(),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl RemoteExecutor for FailingExecutor {
    async fn run(
        &self,
        target: &Target,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ExecError> {
        if command.contains(&self.pattern) {
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Ok(ExecOutput {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: "injected failure".to_string(),
                });
            }
        }
        self.inner.run(target, command, timeout).await
    }
}

/// Delays commands containing `pattern`, to hold a lock long enough for a
/// concurrent invocation to observe contention.
pub struct SlowExecutor {
    inner: LocalExecutor,
    pattern: String,
    delay: Duration,
}

impl SlowExecutor {
    pub fn new(pattern: &str, delay: Duration) -> Self {
        Self {
            inner: LocalExecutor::new(),
            pattern: pattern.to_string(),
            delay,
        }
    }
}

#[async_trait]
impl RemoteExecutor for SlowExecutor {
    async fn run(
        &self,
        target: &Target,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ExecError> {
        if command.contains(&self.pattern) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.run(target, command, timeout).await
    }
}

/// Provisioner that allocates instantly and reports ready after a fixed
/// number of checks.
pub struct MockProvisioner {
    checks_until_ready: usize,
    checks_seen: AtomicUsize,
    created: AtomicUsize,
}

impl MockProvisioner {
    pub fn new(checks_until_ready: usize) -> Self {
        Self {
            checks_until_ready,
            checks_seen: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn create_server(&self, spec: &ServerSpec) -> Result<ServerRef, ProvisionError> {
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ServerRef::new(format!("mock-{}-{}-{n}", spec.site, spec.tier)))
    }

    async fn delete_server(&self, _server: &ServerRef) -> Result<(), ProvisionError> {
        Ok(())
    }

    async fn check_ready(&self, _server: &ServerRef) -> Result<bool, ProvisionError> {
        let seen = self.checks_seen.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(seen >= self.checks_until_ready)
    }
}
