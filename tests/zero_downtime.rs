// ABOUTME: Blue-green swap tests against a real local slot layout.
// ABOUTME: Verifies rotation, health gating, and partial-swap detection.

mod support;

use support::{init_slot_layout, read_links, site, stamp_staged};
use terrace::config::HealthConfig;
use terrace::exec::LocalExecutor;
use terrace::registry::{EnvStatus, Environment};
use terrace::swap::{BlueGreenSwapper, SnapshotStatus, SnapshotStore, SwapError};
use terrace::types::{Target, Tier};
use std::path::Path;
use std::time::Duration;

const RETENTION: Duration = Duration::from_secs(3600);
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

#[tokio::test]
async fn swap_rotates_aliases_and_arms_a_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);

    let executor = LocalExecutor::new();
    let snapshots = SnapshotStore::new(dir.path().join("state"));
    let swapper = BlueGreenSwapper::new(
        &executor,
        &snapshots,
        HealthConfig::default(),
        RETENTION,
        TIMEOUT,
    );

    let snapshot = swapper.swap(&prod_env(&root)).await.unwrap();
    assert_eq!(snapshot.status, SnapshotStatus::Armed);

    // current <- staged, staged <- previous, previous <- current
    assert_eq!(
        read_links(&root),
        (
            "releases/slot-b".to_string(),
            "releases/slot-c".to_string(),
            "releases/slot-a".to_string(),
        )
    );

    // The new current serves the staged content; the window is closed.
    let body = std::fs::read_to_string(root.join("current/index.html")).unwrap();
    assert!(body.contains("v2"));
    assert!(!root.join(".maintenance").exists());
}

#[tokio::test]
async fn failed_health_gate_aborts_with_no_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    // No release marker in staged.

    let executor = LocalExecutor::new();
    let snapshots = SnapshotStore::new(dir.path().join("state"));
    let swapper = BlueGreenSwapper::new(
        &executor,
        &snapshots,
        HealthConfig::default(),
        RETENTION,
        TIMEOUT,
    );

    let before = read_links(&root);
    let err = swapper.swap(&prod_env(&root)).await.unwrap_err();

    assert!(matches!(err, SwapError::HealthGate { .. }));
    assert_eq!(read_links(&root), before, "gate failure must not mutate");
    assert!(!root.join(".maintenance").exists());
    assert!(
        snapshots.history(&site(), Tier::Prod).unwrap().is_empty(),
        "no snapshot for an aborted swap"
    );
}

#[tokio::test]
async fn failing_health_command_blocks_the_swap() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);

    let executor = LocalExecutor::new();
    let snapshots = SnapshotStore::new(dir.path().join("state"));
    let health = HealthConfig {
        marker: ".release".to_string(),
        command: Some("test -f healthz.ok".to_string()),
    };
    let swapper = BlueGreenSwapper::new(&executor, &snapshots, health, RETENTION, TIMEOUT);

    let err = swapper.swap(&prod_env(&root)).await.unwrap_err();
    match err {
        SwapError::HealthGate { detail, .. } => assert!(detail.contains("health command")),
        other => panic!("expected HealthGate, got {other}"),
    }
}

#[tokio::test]
async fn interrupted_rotation_is_detected_as_partial_swap() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);

    // Simulate a crash between the first and second repoint: current was
    // moved to slot-b, staged/previous untouched -> duplicate mapping.
    std::fs::remove_file(root.join("current")).unwrap();
    std::os::unix::fs::symlink("releases/slot-b", root.join("current")).unwrap();

    let executor = LocalExecutor::new();
    let snapshots = SnapshotStore::new(dir.path().join("state"));
    let swapper = BlueGreenSwapper::new(
        &executor,
        &snapshots,
        HealthConfig::default(),
        RETENTION,
        TIMEOUT,
    );

    let err = swapper.swap(&prod_env(&root)).await.unwrap_err();
    match err {
        SwapError::PartialSwap { observed, .. } => {
            assert_eq!(observed.current, "releases/slot-b");
            assert_eq!(observed.staged, "releases/slot-b");
        }
        other => panic!("expected PartialSwap, got {other}"),
    }

    // Never auto-repaired: the broken mapping is left as-is.
    let (current, staged, _) = read_links(&root);
    assert_eq!(current, "releases/slot-b");
    assert_eq!(staged, "releases/slot-b");
}

#[tokio::test]
async fn missing_alias_is_detected_as_partial_swap() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);
    std::fs::remove_file(root.join("previous")).unwrap();

    let executor = LocalExecutor::new();
    let snapshots = SnapshotStore::new(dir.path().join("state"));
    let swapper = BlueGreenSwapper::new(
        &executor,
        &snapshots,
        HealthConfig::default(),
        RETENTION,
        TIMEOUT,
    );

    let err = swapper.swap(&prod_env(&root)).await.unwrap_err();
    match err {
        SwapError::PartialSwap { observed, .. } => {
            assert_eq!(observed.previous, "MISSING");
        }
        other => panic!("expected PartialSwap, got {other}"),
    }
}

/// Two consecutive swaps walk the three valid permutations and never leave
/// them.
#[tokio::test]
async fn consecutive_swaps_cycle_valid_permutations() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("prod");
    init_slot_layout(&root);
    stamp_staged(&root);

    let executor = LocalExecutor::new();
    let snapshots = SnapshotStore::new(dir.path().join("state"));
    let swapper = BlueGreenSwapper::new(
        &executor,
        &snapshots,
        HealthConfig::default(),
        RETENTION,
        TIMEOUT,
    );
    let env = prod_env(&root);

    swapper.swap(&env).await.unwrap();
    // Restage into the recycled slot before swapping again.
    stamp_staged(&root);
    swapper.swap(&env).await.unwrap();

    assert_eq!(
        read_links(&root),
        (
            "releases/slot-c".to_string(),
            "releases/slot-a".to_string(),
            "releases/slot-b".to_string(),
        )
    );
}
