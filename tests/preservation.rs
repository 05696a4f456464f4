//! Preservation Integration Tests
//!
//! Drives the manager through full preservation lifecycles with a
//! recording download session: initiation, progress, completion,
//! failure, cancellation, and the races between them.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use anivault::{
    ContentRegistry, DownloadRequest, DownloadSession, EpisodeContent, MemoryStore,
    OfflineContentManager, OfflineState, PropertyStore, StorageRoots, TaskId,
    UNKNOWN_SIZE_PROGRESS,
};
use tempfile::TempDir;

/// Download session that records calls without performing transfers
#[derive(Default)]
struct RecordingSession {
    started: Mutex<Vec<(TaskId, DownloadRequest)>>,
    aborted: Mutex<Vec<TaskId>>,
}

impl RecordingSession {
    async fn start_count(&self) -> usize {
        self.started.lock().await.len()
    }

    async fn last_task(&self) -> TaskId {
        self.started.lock().await.last().expect("no transfer started").0
    }

    async fn aborted_tasks(&self) -> Vec<TaskId> {
        self.aborted.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl DownloadSession for RecordingSession {
    async fn start(&self, request: DownloadRequest) -> TaskId {
        let task = TaskId::new();
        self.started.lock().await.push((task, request));
        task
    }

    async fn abort(&self, task: TaskId) {
        self.aborted.lock().await.push(task);
    }
}

struct Harness {
    manager: Arc<OfflineContentManager>,
    session: Arc<RecordingSession>,
    store: Arc<MemoryStore>,
    roots: StorageRoots,
    temp: TempDir,
}

impl Harness {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let roots = StorageRoots::new(temp.path().join("home"), temp.path().join("contents"));
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(RecordingSession::default());

        let manager = Arc::new(OfflineContentManager::new(
            store.clone(),
            session.clone(),
            ContentRegistry::with_defaults(),
            roots.clone(),
        ));

        Self {
            manager,
            session,
            store,
            roots,
            temp,
        }
    }

    /// Write a fake downloaded payload to a staging path
    async fn staged_payload(&self, name: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        tokio::fs::write(&path, b"payload").await.unwrap();
        path
    }
}

fn episode(number: u32) -> EpisodeContent {
    EpisodeContent::new(
        "demo",
        number,
        format!("Episode {}", number),
        format!("https://example.com/ep{}.mp4", number),
    )
}

#[tokio::test]
async fn test_fresh_content_is_ready() {
    let h = Harness::new();

    let content = h.manager.content_for(Box::new(episode(42))).await;
    assert_eq!(content.lock().await.state(), &OfflineState::Ready);
    assert_eq!(h.manager.state_for("demo-ep-42").await, OfflineState::Ready);
}

#[tokio::test]
async fn test_content_for_returns_the_same_instance() {
    let h = Harness::new();

    let first = h.manager.content_for(Box::new(episode(1))).await;
    let second = h.manager.content_for(Box::new(episode(1))).await;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(h.manager.tracked_identifiers().await, vec!["demo-ep-1"]);
}

#[tokio::test]
async fn test_preserve_through_to_preserved() {
    let h = Harness::new();
    let content = h.manager.content_for(Box::new(episode(42))).await;

    h.manager.initiate_preservation("demo-ep-42").await;
    assert_eq!(
        h.manager.state_for("demo-ep-42").await,
        OfflineState::PreservationInitiated
    );

    let task = h.session.last_task().await;
    h.manager.on_progress(task, 50, Some(100)).await;
    assert_eq!(
        h.manager.state_for("demo-ep-42").await,
        OfflineState::Preserving { progress: 0.5 }
    );

    let staged = h.staged_payload("ep42.part").await;
    h.manager.on_finished(task, &staged, Some("video.mp4")).await;

    assert_eq!(h.manager.state_for("demo-ep-42").await, OfflineState::Preserved);

    let content = content.lock().await;
    let location = content.location().expect("preserved content has a location");
    assert_eq!(location.relative_path, "Episode 42 - ep42.mp4");

    let destination = location.resolve(&h.roots);
    assert!(destination.exists());
    assert_eq!(std::fs::read(&destination).unwrap(), b"payload");
    assert!(!staged.exists(), "staged payload was moved, not copied");
}

#[tokio::test]
async fn test_unknown_transfer_size_reports_placeholder_progress() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(5))).await;
    h.manager.initiate_preservation("demo-ep-5").await;

    let task = h.session.last_task().await;
    h.manager.on_progress(task, 123_456, None).await;

    assert_eq!(
        h.manager.state_for("demo-ep-5").await,
        OfflineState::Preserving {
            progress: UNKNOWN_SIZE_PROGRESS
        }
    );
}

#[tokio::test]
async fn test_preserve_is_single_flight() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(3))).await;

    h.manager.initiate_preservation("demo-ep-3").await;
    h.manager.initiate_preservation("demo-ep-3").await;
    h.manager.initiate_preservation("demo-ep-3").await;

    assert_eq!(h.session.start_count().await, 1);
}

#[tokio::test]
async fn test_transfer_failure_lands_in_error_state() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(9))).await;
    h.manager.initiate_preservation("demo-ep-9").await;

    let task = h.session.last_task().await;
    h.manager.on_progress(task, 10, Some(100)).await;
    h.manager.on_failed(task, "network error").await;

    assert_eq!(
        h.manager.state_for("demo-ep-9").await,
        OfflineState::Error {
            message: "network error".to_string()
        }
    );

    // The failure is written through to the store
    let record = h.store.get("demo-ep-9").await.unwrap().unwrap();
    assert_eq!(record.state.error_message(), Some("network error"));
    assert!(record.location().is_none());
}

#[tokio::test]
async fn test_represerve_after_error_starts_fresh() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(9))).await;
    h.manager.initiate_preservation("demo-ep-9").await;

    let first = h.session.last_task().await;
    h.manager.on_failed(first, "network error").await;

    h.manager.initiate_preservation("demo-ep-9").await;

    assert_eq!(h.session.start_count().await, 2);
    assert_eq!(
        h.manager.state_for("demo-ep-9").await,
        OfflineState::PreservationInitiated
    );
}

#[tokio::test]
async fn test_cancel_aborts_and_resets_to_ready() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(7))).await;
    h.manager.initiate_preservation("demo-ep-7").await;

    let task = h.session.last_task().await;
    h.manager.cancel_preservation("demo-ep-7").await;

    assert_eq!(h.manager.state_for("demo-ep-7").await, OfflineState::Ready);
    assert_eq!(h.session.aborted_tasks().await, vec![task]);

    let record = h.store.get("demo-ep-7").await.unwrap().unwrap();
    assert_eq!(record.state, OfflineState::Ready);
    assert!(record.location().is_none());
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(7))).await;

    h.manager.cancel_preservation("demo-ep-7").await;
    h.manager.cancel_preservation("demo-ep-7").await;

    assert_eq!(h.manager.state_for("demo-ep-7").await, OfflineState::Ready);
    assert!(h.session.aborted_tasks().await.is_empty());
}

#[tokio::test]
async fn test_stale_completion_after_cancel_is_dropped() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(8))).await;
    h.manager.initiate_preservation("demo-ep-8").await;

    let task = h.session.last_task().await;
    h.manager.cancel_preservation("demo-ep-8").await;

    // The abort raced a completion that had already fired
    let staged = h.staged_payload("ep8.part").await;
    h.manager.on_finished(task, &staged, Some("video.mp4")).await;

    assert_eq!(h.manager.state_for("demo-ep-8").await, OfflineState::Ready);
    assert!(!staged.exists(), "stale payload is cleaned up");
    assert!(!h.roots.persist.join("Episode 8 - ep8.mp4").exists());
}

#[tokio::test]
async fn test_stale_failure_after_represerve_is_dropped() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(8))).await;
    h.manager.initiate_preservation("demo-ep-8").await;
    let first = h.session.last_task().await;

    h.manager.cancel_preservation("demo-ep-8").await;
    h.manager.initiate_preservation("demo-ep-8").await;

    // A failure for the replaced handle must not clobber the new attempt
    h.manager.on_failed(first, "timeout").await;

    assert_eq!(
        h.manager.state_for("demo-ep-8").await,
        OfflineState::PreservationInitiated
    );
}

#[tokio::test]
async fn test_concurrent_completions_for_different_identifiers() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(1))).await;
    h.manager.content_for(Box::new(episode(2))).await;

    h.manager.initiate_preservation("demo-ep-1").await;
    let task_one = h.session.last_task().await;
    h.manager.initiate_preservation("demo-ep-2").await;
    let task_two = h.session.last_task().await;

    let staged_one = h.staged_payload("ep1.part").await;
    let staged_two = h.staged_payload("ep2.part").await;

    tokio::join!(
        h.manager.on_finished(task_one, &staged_one, Some("a.mp4")),
        h.manager.on_finished(task_two, &staged_two, Some("b.mp4")),
    );

    assert_eq!(h.manager.state_for("demo-ep-1").await, OfflineState::Preserved);
    assert_eq!(h.manager.state_for("demo-ep-2").await, OfflineState::Preserved);
    assert!(h.roots.persist.join("Episode 1 - ep1.mp4").exists());
    assert!(h.roots.persist.join("Episode 2 - ep2.mp4").exists());
}

#[tokio::test]
async fn test_completion_for_unknown_task_is_ignored() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(1))).await;

    let staged = h.staged_payload("stray.part").await;
    h.manager.on_finished(TaskId::new(), &staged, None).await;

    assert_eq!(h.manager.state_for("demo-ep-1").await, OfflineState::Ready);
    assert!(!staged.exists());
}

#[tokio::test]
async fn test_duplicate_destination_is_replaced() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(4))).await;

    // A file already sits at the destination
    tokio::fs::create_dir_all(&h.roots.persist).await.unwrap();
    let destination = h.roots.persist.join("Episode 4 - ep4.mp4");
    tokio::fs::write(&destination, b"old contents").await.unwrap();

    h.manager.initiate_preservation("demo-ep-4").await;
    let task = h.session.last_task().await;
    let staged = h.staged_payload("ep4.part").await;
    h.manager.on_finished(task, &staged, Some("video.mp4")).await;

    assert_eq!(h.manager.state_for("demo-ep-4").await, OfflineState::Preserved);
    assert_eq!(std::fs::read(&destination).unwrap(), b"payload");
}

#[tokio::test]
async fn test_missing_payload_lands_in_error_state() {
    let h = Harness::new();
    h.manager.content_for(Box::new(episode(6))).await;
    h.manager.initiate_preservation("demo-ep-6").await;

    let task = h.session.last_task().await;
    let gone = h.temp.path().join("never-written.part");
    h.manager.on_finished(task, &gone, Some("video.mp4")).await;

    let state = h.manager.state_for("demo-ep-6").await;
    assert!(
        matches!(state, OfflineState::Error { .. }),
        "expected error state, got {:?}",
        state
    );
}

#[tokio::test]
async fn test_background_ack_fires_once_per_terminal_event() {
    let h = Harness::new();
    let acknowledged = Arc::new(AtomicUsize::new(0));

    let counter = acknowledged.clone();
    h.manager
        .set_background_completion_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;

    h.manager.content_for(Box::new(episode(2))).await;
    h.manager.initiate_preservation("demo-ep-2").await;
    let task = h.session.last_task().await;

    let staged = h.staged_payload("ep2.part").await;
    h.manager.on_finished(task, &staged, Some("video.mp4")).await;
    assert_eq!(acknowledged.load(Ordering::SeqCst), 1);

    // A later terminal event without a freshly-set handler is quiet
    h.manager.cancel_preservation("demo-ep-2").await;
    assert_eq!(acknowledged.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_state_changes_are_broadcast() {
    let h = Harness::new();
    let mut changes = h.manager.subscribe();

    h.manager.content_for(Box::new(episode(11))).await;
    h.manager.initiate_preservation("demo-ep-11").await;
    let task = h.session.last_task().await;
    h.manager.on_progress(task, 30, Some(100)).await;

    let first = changes.recv().await.unwrap();
    assert_eq!(first.identifier, "demo-ep-11");
    assert_eq!(first.state, OfflineState::PreservationInitiated);

    let second = changes.recv().await.unwrap();
    assert_eq!(second.state, OfflineState::Preserving { progress: 0.3 });
}
