//! Integration tests for the replay flow
//!
//! Record -> snapshot -> replay, against a fake cluster that remembers what
//! earlier runs created.

use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use rewind::block::{BlockResult, BlockStatus, DetailRef};
use rewind::dispatch::{Execution, MockDispatcher};
use rewind::replay::{FailureCause, Outcome, ReplayEngine, ReplayError};
use rewind::snapshot::{decode, encode, DecodeError, SnapshotMode, SNAPSHOT_SCHEMA_VERSION};

use super::common::determinism::DeterministicUuidGenerator;
use super::common::fixtures::{pods_table, record_session, FakeCluster};

/// A static snapshot replays identically and never touches the backend
#[tokio::test]
async fn static_replay_renders_identically_without_dispatch() {
    let ids = DeterministicUuidGenerator::new();
    let mut store = ids.store();
    let index = store.append("create pod nginx").unwrap().index;
    store
        .finalize(index, BlockStatus::Success, pods_table(&["nginx"]))
        .unwrap();

    let bytes = encode(store.view(), SnapshotMode::Static)
        .to_json_bytes()
        .unwrap();

    let backend = MockDispatcher::new();
    let report = ReplayEngine::new(Arc::new(backend.clone()))
        .replay_bytes(&bytes)
        .await
        .unwrap();

    assert_eq!(backend.call_count(), 0);
    assert_eq!(report.blocks.len(), 1);
    let block = &report.blocks[0];
    assert_eq!(block.command(), "create pod nginx");
    assert_eq!(block.status(), BlockStatus::Success);
    assert_eq!(block.result(), Some(&pods_table(&["nginx"])));
    assert!(report.transcript.same_structure(store.transcript()));
}

/// Re-running a create against a cluster that still has the pod conflicts with 409
#[tokio::test]
async fn reexec_create_conflicts_when_resource_exists() {
    let dir = tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::new());
    let session = record_session(dir.path(), cluster.clone(), &["create pod nginx"]).await;
    assert_eq!(cluster.pods(), vec!["nginx"]);

    let path = dir.path().join("exec.json");
    session
        .snapshot(&path, SnapshotMode::Reexec, false)
        .await
        .unwrap();

    let report = ReplayEngine::new(cluster.clone())
        .replay_file(&path)
        .await
        .unwrap();

    let last = report.blocks.last().unwrap();
    assert_eq!(last.outcome(), Some(Outcome::Conflict));
    assert_eq!(last.status(), BlockStatus::Error);
    assert_eq!(last.status_code(), Some(409));

    let reconciliation = last.reconciliation.as_ref().unwrap();
    assert_eq!(reconciliation.cause, Some(FailureCause::AlreadyExists));
    assert!(reconciliation
        .message
        .as_deref()
        .unwrap()
        .contains("pods \"nginx\""));
    // The recorded success is kept next to the live failure
    assert_eq!(last.recorded, Some(BlockResult::resource("Pod", "nginx")));
}

/// Dependent commands run one at a time, in recorded order
#[tokio::test]
async fn reexec_runs_dependent_blocks_in_order() {
    let dir = tempdir().unwrap();
    let recording = Arc::new(FakeCluster::new());
    let session = record_session(
        dir.path(),
        recording,
        &["create pod nginx", "delete pod nginx"],
    )
    .await;

    let path = dir.path().join("create-delete.json");
    session
        .snapshot(&path, SnapshotMode::Reexec, false)
        .await
        .unwrap();

    // nginx is already gone on the live side
    let live = Arc::new(FakeCluster::new().with_latency(Duration::from_millis(10)));
    let report = ReplayEngine::new(live.clone())
        .replay_file(&path)
        .await
        .unwrap();

    assert!(report.is_complete());
    let create = &report.blocks[0];
    assert!(matches!(
        create.outcome(),
        Some(Outcome::Matched) | Some(Outcome::Diverged)
    ));
    assert_eq!(create.status(), BlockStatus::Success);
    assert_eq!(report.blocks[1].outcome(), Some(Outcome::Matched));

    assert_eq!(
        live.log(),
        vec![
            "start:create pod nginx",
            "end:create pod nginx",
            "start:delete pod nginx",
            "end:delete pod nginx",
        ]
    );
    assert_eq!(live.max_in_flight(), 1);
    assert!(live.pods().is_empty());
}

/// A document from a newer writer is refused before anything is rebuilt
#[tokio::test]
async fn newer_document_version_is_refused() {
    let newer = format!(
        r#"{{"version": {}, "mode": "reexec", "blocks": [
            {{"index": 0, "command": "create pod nginx", "status": "success",
              "result": {{"type": "text", "text": "ok"}}, "detailRef": null, "reexecutable": true}}
        ]}}"#,
        SNAPSHOT_SCHEMA_VERSION + 1
    );

    assert!(matches!(
        decode(newer.as_bytes()),
        Err(DecodeError::UnsupportedVersion { .. })
    ));

    let backend = MockDispatcher::new();
    let err = ReplayEngine::new(Arc::new(backend.clone()))
        .replay_bytes(newer.as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ReplayError::Decode(DecodeError::UnsupportedVersion { .. })
    ));
    assert_eq!(backend.call_count(), 0);
}

/// One failing block does not stop the ones after it
#[tokio::test]
async fn failures_are_isolated_per_block() {
    let dir = tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::new());
    let session = record_session(
        dir.path(),
        cluster.clone(),
        &["create pod nginx", "create pod redis", "get pods"],
    )
    .await;
    let path = dir.path().join("three.json");
    session
        .snapshot(&path, SnapshotMode::Reexec, false)
        .await
        .unwrap();

    // Only nginx survived since the recording
    let live = Arc::new(FakeCluster::with_pods(&["nginx"]));
    let report = ReplayEngine::new(live.clone())
        .replay_file(&path)
        .await
        .unwrap();

    let outcomes: Vec<_> = report.blocks.iter().map(|b| b.outcome()).collect();
    assert_eq!(
        outcomes,
        vec![
            Some(Outcome::Conflict),
            Some(Outcome::Matched),
            Some(Outcome::Matched)
        ]
    );
    assert_eq!(report.conflicts().count(), 1);
    assert_eq!(live.pods(), vec!["nginx", "redis"]);
}

/// Replaying the same static document twice gives the same transcript
#[tokio::test]
async fn static_replay_is_idempotent() {
    let dir = tempdir().unwrap();
    let session = record_session(
        dir.path(),
        Arc::new(FakeCluster::new()),
        &["create pod nginx", "get pods", "delete pod missing"],
    )
    .await;
    let path = dir.path().join("static.json");
    session
        .snapshot(&path, SnapshotMode::Static, false)
        .await
        .unwrap();

    let engine = ReplayEngine::new(Arc::new(MockDispatcher::new()));
    let first = engine.replay_file(&path).await.unwrap();
    let second = engine.replay_file(&path).await.unwrap();

    assert!(first.transcript.same_structure(&second.transcript));
    assert!(first.transcript.same_structure(session.store().transcript()));
    assert_eq!(first.blocks[2].status(), BlockStatus::Error);
    assert_eq!(first.blocks[2].status_code(), Some(404));
}

/// Detail views stay closed after replay until a row is clicked
#[tokio::test]
async fn detail_views_open_only_on_user_action() {
    let dir = tempdir().unwrap();
    let mut session = record_session(
        dir.path(),
        Arc::new(FakeCluster::new()),
        &["create pod nginx", "get pods"],
    )
    .await;
    session
        .open_detail(1, DetailRef::resource("pod", "nginx"))
        .unwrap();

    let path = dir.path().join("detail.json");
    session
        .snapshot(&path, SnapshotMode::Static, false)
        .await
        .unwrap();

    let mut report = ReplayEngine::new(Arc::new(MockDispatcher::new()))
        .replay_file(&path)
        .await
        .unwrap();

    assert!(report.blocks.iter().all(|b| !b.is_detail_open()));
    let table = &mut report.blocks[1];
    assert_eq!(
        table.block.detail_ref,
        Some(DetailRef::resource("pod", "nginx"))
    );

    let opened = table.open_row_detail("nginx").unwrap();
    assert_eq!(opened.as_str(), "pod/nginx");
    assert!(table.is_detail_open());
    assert!(table.open_row_detail("redis").is_none());

    table.close_detail();
    assert_eq!(table.open_detail(), Some(&DetailRef::new("pod/nginx")));
}

/// Cancelling mid-dispatch drops that block and never starts the next
#[tokio::test]
async fn cancellation_leaves_no_partial_block() {
    let mut store = DeterministicUuidGenerator::new().store();
    for command in ["a", "b", "c"] {
        let index = store.append(command).unwrap().index;
        store
            .finalize(index, BlockStatus::Success, BlockResult::text(command))
            .unwrap();
    }
    let bytes = encode(store.view(), SnapshotMode::Reexec)
        .to_json_bytes()
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let backend = MockDispatcher::new()
        .respond("a", Execution::success(BlockResult::text("a")))
        .respond("b", Execution::success(BlockResult::text("b")))
        .respond("c", Execution::success(BlockResult::text("c")))
        .with_delay(Duration::from_millis(50))
        .with_hook(move |command| {
            if command == "b" {
                trigger.cancel();
            }
        });

    let report = ReplayEngine::new(Arc::new(backend.clone()))
        .with_cancellation(cancel)
        .replay_bytes(&bytes)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(!report.is_complete());
    assert_eq!(report.blocks.len(), 1);
    assert_eq!(report.transcript.len(), 1);
    assert_eq!(backend.calls(), vec!["a", "b"]);
}

/// Documents written by the first release still replay
#[tokio::test]
async fn legacy_document_replays() {
    let legacy = br#"{
        "version": 1,
        "exec": true,
        "blocks": [
            {"command": "create pod nginx", "status": "success",
             "result": {"type": "resource", "kind": "Pod", "name": "nginx"}}
        ]
    }"#;

    let cluster = Arc::new(FakeCluster::new());
    let report = ReplayEngine::new(cluster.clone())
        .replay_bytes(legacy)
        .await
        .unwrap();

    assert_eq!(report.mode, SnapshotMode::Reexec);
    assert_eq!(report.blocks[0].outcome(), Some(Outcome::Matched));
    assert_eq!(cluster.pods(), vec!["nginx"]);
}

/// Reproducing the recorded 404 is still reported as a conflict
#[tokio::test]
async fn reproduced_failure_is_reported_as_conflict() {
    let dir = tempdir().unwrap();
    let cluster = Arc::new(FakeCluster::new());
    let session = record_session(dir.path(), cluster.clone(), &["delete pod nginx"]).await;
    assert_eq!(session.store().transcript().blocks()[0].status, BlockStatus::Error);

    let path = dir.path().join("delete-missing.json");
    session
        .snapshot(&path, SnapshotMode::Reexec, false)
        .await
        .unwrap();

    let report = ReplayEngine::new(cluster).replay_file(&path).await.unwrap();

    let block = &report.blocks[0];
    assert_eq!(block.outcome(), Some(Outcome::Conflict));
    assert_eq!(block.status(), BlockStatus::Error);
    assert_eq!(block.status_code(), Some(404));
    assert_eq!(
        block.reconciliation.as_ref().unwrap().cause,
        Some(FailureCause::NotFound)
    );
}

/// A recorded failure that now succeeds renders the live success as diverged
#[tokio::test]
async fn recorded_failure_that_now_succeeds_is_diverged() {
    let dir = tempdir().unwrap();
    let session = record_session(
        dir.path(),
        Arc::new(FakeCluster::new()),
        &["delete pod nginx"],
    )
    .await;
    let path = dir.path().join("delete.json");
    session
        .snapshot(&path, SnapshotMode::Reexec, false)
        .await
        .unwrap();

    let live = Arc::new(FakeCluster::with_pods(&["nginx"]));
    let report = ReplayEngine::new(live.clone())
        .replay_file(&path)
        .await
        .unwrap();

    let block = &report.blocks[0];
    assert_eq!(block.outcome(), Some(Outcome::Diverged));
    assert_eq!(block.status(), BlockStatus::Success);
    assert_eq!(
        block.result(),
        Some(&BlockResult::text("pod \"nginx\" deleted"))
    );
    assert!(block.recorded.as_ref().is_some_and(BlockResult::is_failure));
    assert!(live.pods().is_empty());
}
