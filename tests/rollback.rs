// ABOUTME: Rollback tests: window semantics and exact inverse rotation.
// ABOUTME: Rollback after one swap restores; after a second swap it expires.

mod support;

use support::{init_slot_layout, read_links, site, stamp_staged};
use terrace::config::HealthConfig;
use terrace::exec::LocalExecutor;
use terrace::registry::{EnvStatus, Environment};
use terrace::swap::{
    BlueGreenSwapper, RollbackError, RollbackManager, SnapshotStore, WindowClosed,
};
use terrace::types::{Target, Tier};
use std::path::Path;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);

fn prod_env(root: &Path) -> Environment {
    Environment::absent(
        site(),
        Tier::Prod,
        Target::local(root),
        "demo.invalid".to_string(),
    )
    .with_status(EnvStatus::Active)
}

struct Rig {
    executor: LocalExecutor,
    snapshots: SnapshotStore,
    retention: Duration,
}

impl Rig {
    fn new(state: &Path, retention: Duration) -> Self {
        Self {
            executor: LocalExecutor::new(),
            snapshots: SnapshotStore::new(state),
            retention,
        }
    }

    fn swapper(&self) -> BlueGreenSwapper<'_, LocalExecutor> {
        BlueGreenSwapper::new(
            &self.executor,
            &self.snapshots,
            HealthConfig::default(),
            self.retention,
            TIMEOUT,
        )
    }
}

/// A swap followed by a rollback with no intervening swap restores the
/// byte-identical pre-swap alias mapping.
#[tokio::test]
async fn rollback_restores_the_exact_pre_swap_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);
    // The slot serving now becomes "previous" after the swap, and rollback
    // health-gates it before restoring it.
    std::fs::write(root.join("current/.release"), "old-release\n").unwrap();

    let rig = Rig::new(&dir.path().join("state"), Duration::from_secs(3600));
    let env = prod_env(&root);

    let before = read_links(&root);
    let swapper = rig.swapper();
    swapper.swap(&env).await.unwrap();
    assert_ne!(read_links(&root), before);

    let manager = RollbackManager::new(&swapper, &rig.snapshots);
    manager.rollback(&env).await.unwrap();

    assert_eq!(read_links(&root), before);
}

/// A rollback attempted after a second swap reports the window expired and
/// leaves the mapping unchanged.
#[tokio::test]
async fn rollback_after_second_swap_is_expired() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);

    let rig = Rig::new(&dir.path().join("state"), Duration::from_secs(3600));
    let env = prod_env(&root);
    let swapper = rig.swapper();

    swapper.swap(&env).await.unwrap();
    stamp_staged(&root);
    swapper.swap(&env).await.unwrap();

    let mapping = read_links(&root);
    let manager = RollbackManager::new(&swapper, &rig.snapshots);
    let err = manager.rollback(&env).await.unwrap_err();

    match err {
        RollbackError::WindowExpired { reason, .. } => {
            assert_eq!(reason, WindowClosed::Superseded);
        }
        other => panic!("expected WindowExpired, got {other}"),
    }
    assert_eq!(read_links(&root), mapping, "mapping must be unchanged");
}

#[tokio::test]
async fn rollback_without_any_swap_is_expired() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);

    let rig = Rig::new(&dir.path().join("state"), Duration::from_secs(3600));
    let env = prod_env(&root);
    let swapper = rig.swapper();
    let manager = RollbackManager::new(&swapper, &rig.snapshots);

    let err = manager.rollback(&env).await.unwrap_err();
    match err {
        RollbackError::WindowExpired { reason, .. } => {
            assert_eq!(reason, WindowClosed::NoHistory);
        }
        other => panic!("expected WindowExpired, got {other}"),
    }
}

#[tokio::test]
async fn rollback_past_retention_is_expired() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);

    // Zero retention: the window is already shut when the swap lands.
    let rig = Rig::new(&dir.path().join("state"), Duration::from_secs(0));
    let env = prod_env(&root);
    let swapper = rig.swapper();
    swapper.swap(&env).await.unwrap();

    let manager = RollbackManager::new(&swapper, &rig.snapshots);
    let err = manager.rollback(&env).await.unwrap_err();
    match err {
        RollbackError::WindowExpired { reason, .. } => {
            assert!(matches!(reason, WindowClosed::Expired { .. }));
        }
        other => panic!("expected WindowExpired, got {other}"),
    }
}

#[tokio::test]
async fn second_rollback_is_expired() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);
    std::fs::write(root.join("current/.release"), "old\n").unwrap();

    let rig = Rig::new(&dir.path().join("state"), Duration::from_secs(3600));
    let env = prod_env(&root);
    let swapper = rig.swapper();
    swapper.swap(&env).await.unwrap();

    let manager = RollbackManager::new(&swapper, &rig.snapshots);
    manager.rollback(&env).await.unwrap();

    let err = manager.rollback(&env).await.unwrap_err();
    match err {
        RollbackError::WindowExpired { reason, .. } => {
            assert_eq!(reason, WindowClosed::Consumed);
        }
        other => panic!("expected WindowExpired, got {other}"),
    }
}

/// Drift: a mapping changed outside the recorded history cannot be rolled
/// back over.
#[tokio::test]
async fn drifted_mapping_is_expired_and_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);

    let rig = Rig::new(&dir.path().join("state"), Duration::from_secs(3600));
    let env = prod_env(&root);
    let swapper = rig.swapper();
    swapper.swap(&env).await.unwrap();

    // A manual full rotation behind terrace's back: still a valid
    // permutation, but not the one the snapshot recorded.
    for (alias, slot) in [
        ("current", "releases/slot-c"),
        ("staged", "releases/slot-a"),
        ("previous", "releases/slot-b"),
    ] {
        std::fs::remove_file(root.join(alias)).unwrap();
        std::os::unix::fs::symlink(slot, root.join(alias)).unwrap();
    }

    let mapping = read_links(&root);
    let manager = RollbackManager::new(&swapper, &rig.snapshots);
    let err = manager.rollback(&env).await.unwrap_err();

    match err {
        RollbackError::WindowExpired { reason, .. } => {
            assert!(matches!(reason, WindowClosed::Drifted { .. }));
        }
        other => panic!("expected WindowExpired, got {other}"),
    }
    assert_eq!(read_links(&root), mapping);
}
