//! Plain-HTTP download session backed by reqwest.
//!
//! Each transfer streams into a staging file under the home root and
//! reports progress per received chunk. Aborting drops the transfer
//! task and removes its staging file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use super::{DownloadRequest, DownloadSession, SessionEvent, TaskId};

/// Download session performing plain HTTP(S) file transfers
pub struct HttpDownloadSession {
    client: reqwest::Client,
    events: mpsc::UnboundedSender<SessionEvent>,
    staging_dir: PathBuf,
    active: Arc<Mutex<HashMap<TaskId, ActiveTransfer>>>,
}

struct ActiveTransfer {
    handle: tokio::task::JoinHandle<()>,
    staging_path: PathBuf,
}

impl HttpDownloadSession {
    /// Create a session that emits events on the given channel and
    /// stages payloads under `staging_dir`
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            events,
            staging_dir: staging_dir.into(),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of transfers currently in flight
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }

    async fn create_staging_file(&self) -> std::io::Result<(std::fs::File, PathBuf)> {
        fs::create_dir_all(&self.staging_dir).await?;

        let staged = tempfile::Builder::new()
            .prefix("transfer-")
            .suffix(".part")
            .tempfile_in(&self.staging_dir)?;

        // Detach from the guard so the file survives until the manager
        // moves or removes it
        staged.keep().map_err(|e| e.error)
    }
}

#[async_trait::async_trait]
impl DownloadSession for HttpDownloadSession {
    async fn start(&self, request: DownloadRequest) -> TaskId {
        let task = TaskId::new();

        let (file, staging_path) = match self.create_staging_file().await {
            Ok(staged) => staged,
            Err(e) => {
                // Delivered as a failure event rather than an error so the
                // caller's contract stays fire-and-forget
                let _ = self.events.send(SessionEvent::Failed {
                    task,
                    cause: format!("cannot create staging file: {}", e),
                });
                return task;
            }
        };

        debug!(%task, url = %request.url, "Starting transfer");

        // Hold the registry lock across the spawn so the transfer's own
        // deregistration cannot run before the insert
        let mut active = self.active.lock().await;

        let handle = tokio::spawn(transfer(
            self.client.clone(),
            request,
            task,
            tokio::fs::File::from_std(file),
            staging_path.clone(),
            self.events.clone(),
            Arc::clone(&self.active),
        ));

        active.insert(task, ActiveTransfer { handle, staging_path });

        task
    }

    async fn abort(&self, task: TaskId) {
        let Some(transfer) = self.active.lock().await.remove(&task) else {
            return;
        };

        transfer.handle.abort();
        if let Err(e) = fs::remove_file(&transfer.staging_path).await {
            debug!(%task, error = %e, "Staging file already gone");
        }

        debug!(%task, "Transfer aborted");
    }
}

/// Run one transfer to completion, emitting progress and a terminal event
#[allow(clippy::too_many_arguments)]
async fn transfer(
    client: reqwest::Client,
    request: DownloadRequest,
    task: TaskId,
    mut file: tokio::fs::File,
    staging_path: PathBuf,
    events: mpsc::UnboundedSender<SessionEvent>,
    active: Arc<Mutex<HashMap<TaskId, ActiveTransfer>>>,
) {
    let outcome = run_transfer(&client, &request, task, &mut file, &staging_path, &events).await;

    active.lock().await.remove(&task);

    if let Err(cause) = outcome {
        warn!(%task, name = %request.display_name, %cause, "Transfer failed");
        if let Err(e) = fs::remove_file(&staging_path).await {
            debug!(%task, error = %e, "Staging file already gone");
        }
        let _ = events.send(SessionEvent::Failed { task, cause });
    }
}

async fn run_transfer(
    client: &reqwest::Client,
    request: &DownloadRequest,
    task: TaskId,
    file: &mut tokio::fs::File,
    staging_path: &Path,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Result<(), String> {
    let mut response = client
        .get(&request.url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?;

    let total_bytes = response.content_length();
    let suggested_filename = suggested_filename(response.url().path());
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        bytes_written += chunk.len() as u64;

        let _ = events.send(SessionEvent::Progress {
            task,
            bytes_written,
            total_bytes,
        });
    }

    file.flush().await.map_err(|e| e.to_string())?;

    let _ = events.send(SessionEvent::Finished {
        task,
        temp_path: staging_path.to_path_buf(),
        suggested_filename,
    });

    Ok(())
}

/// Extract a filename from the final URL path, if it has one
fn suggested_filename(url_path: &str) -> Option<String> {
    url_path
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_filename_from_path() {
        assert_eq!(
            suggested_filename("/videos/ep42.mp4"),
            Some("ep42.mp4".to_string())
        );
        assert_eq!(suggested_filename("/videos/"), None);
        assert_eq!(suggested_filename(""), None);
    }

    #[tokio::test]
    async fn test_staging_failure_emits_failed_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        // A file path cannot serve as a staging directory
        let temp = tempfile::TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        tokio::fs::write(&blocker, b"x").await.unwrap();

        let session = HttpDownloadSession::new(tx, &blocker);
        let task = session.start(DownloadRequest::new("http://localhost/x", "x")).await;

        match rx.recv().await {
            Some(SessionEvent::Failed { task: failed, .. }) => assert_eq!(failed, task),
            other => panic!("expected failure event, got {:?}", other),
        }
        assert_eq!(session.active_count().await, 0);
    }
}
