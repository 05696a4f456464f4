//! Offline content manager.
//!
//! The manager owns the canonical pool of offline content, bridges
//! download-session events into state-machine transitions, resolves
//! file-system locations, and restores persisted records at startup.
//!
//! # Concurrency model
//!
//! The pool maps identifier → `Arc<Mutex<OfflineContent>>`. The outer
//! pool lock covers lookup and insert only; the per-entry lock
//! serializes one writer per identifier while different identifiers
//! proceed concurrently. A transition and its store write happen under
//! the entry lock as one unit. Cancellation invalidates the task handle
//! before the abort is issued, so late completion events fail the
//! handle comparison and are dropped.
//!
//! Lock order: pool → entry → tasks.

mod paths;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::content::{ContentKind, ContentRegistry, OfflineContent};
use crate::domain::{
    OfflineState, PreserveError, ResourceLocation, RootKind, StateChange, StorageRoots,
};
use crate::session::{DownloadSession, SessionEvent, TaskId};
use crate::store::{PropertyStore, StoreError};

/// Placeholder progress fraction reported while the total transfer size
/// is unknown. A heuristic carried over for compatibility; tune freely.
pub const UNKNOWN_SIZE_PROGRESS: f32 = 0.9;

/// Callback informing the host that background work has finished
pub type BackgroundAck = Box<dyn FnOnce() + Send>;

/// Orchestrates the content pool and the download-session bridge
pub struct OfflineContentManager {
    store: Arc<dyn PropertyStore>,
    session: Arc<dyn DownloadSession>,
    registry: ContentRegistry,
    roots: StorageRoots,

    /// The only shared mutable structure in this engine
    pool: Mutex<HashMap<String, Arc<Mutex<OfflineContent>>>>,

    /// Live task handle → identifier, for event resolution
    tasks: Mutex<HashMap<TaskId, String>>,

    /// State-change notifications, one per transition
    changes: broadcast::Sender<StateChange>,

    /// Invoked exactly once after finishing wake-up work, then cleared
    background_ack: Mutex<Option<BackgroundAck>>,
}

impl OfflineContentManager {
    /// Create a manager over explicit collaborators
    pub fn new(
        store: Arc<dyn PropertyStore>,
        session: Arc<dyn DownloadSession>,
        registry: ContentRegistry,
        roots: StorageRoots,
    ) -> Self {
        let (changes, _) = broadcast::channel(64);

        Self {
            store,
            session,
            registry,
            roots,
            pool: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            changes,
            background_ack: Mutex::new(None),
        }
    }

    /// Subscribe to state-change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    /// The storage roots this manager resolves locations against
    pub fn roots(&self) -> &StorageRoots {
        &self.roots
    }

    /// Store the host's background completion handler
    pub async fn set_background_completion_handler(&self, handler: impl FnOnce() + Send + 'static) {
        *self.background_ack.lock().await = Some(Box::new(handler));
    }

    /// Return the pool entry for a content kind, creating a fresh ready
    /// one on first request. Never returns two instances for the same
    /// identifier.
    pub async fn content_for(&self, kind: Box<dyn ContentKind>) -> Arc<Mutex<OfflineContent>> {
        let identifier = kind.identifier();
        let mut pool = self.pool.lock().await;

        if let Some(existing) = pool.get(&identifier) {
            return Arc::clone(existing);
        }

        let entry = Arc::new(Mutex::new(OfflineContent::new(kind)));
        pool.insert(identifier, Arc::clone(&entry));
        entry
    }

    /// Look up an existing pool entry by identifier
    pub async fn lookup(&self, identifier: &str) -> Option<Arc<Mutex<OfflineContent>>> {
        self.pool.lock().await.get(identifier).cloned()
    }

    /// Read the state for an identifier; unknown identifiers are ready
    pub async fn state_for(&self, identifier: &str) -> OfflineState {
        match self.lookup(identifier).await {
            Some(entry) => entry.lock().await.state().clone(),
            None => OfflineState::Ready,
        }
    }

    /// Identifiers currently tracked in the pool
    pub async fn tracked_identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<_> = self.pool.lock().await.keys().cloned().collect();
        identifiers.sort();
        identifiers
    }

    /// Start preserving the identified content. Fire-and-forget: a
    /// failure lands in the item's error state, never in the caller.
    #[instrument(skip(self))]
    pub async fn initiate_preservation(&self, identifier: &str) {
        let Some(entry) = self.lookup(identifier).await else {
            warn!(identifier, "Cannot preserve unknown content");
            return;
        };

        let mut entry = entry.lock().await;

        if entry.task().is_some() {
            debug!(identifier, "Preservation already in flight");
            return;
        }
        if entry.state() == &OfflineState::Preserved {
            debug!(identifier, "Content already preserved");
            return;
        }

        let task = self.session.start(entry.request()).await;
        entry.begin(task);
        self.tasks.lock().await.insert(task, identifier.to_string());

        info!(identifier, %task, "Preservation initiated");

        self.persist(&entry).await;
        self.notify(identifier, entry.state());
    }

    /// Cancel preservation and reset to ready. Idempotent; never
    /// transitions to error.
    #[instrument(skip(self))]
    pub async fn cancel_preservation(&self, identifier: &str) {
        let Some(entry) = self.lookup(identifier).await else {
            return;
        };

        let mut entry = entry.lock().await;

        if entry.task().is_none() && entry.state() == &OfflineState::Ready {
            return;
        }

        // Invalidate the handle before instructing the session to abort
        // so a completion racing the abort fails the handle comparison
        let task = entry.cancel();
        if let Some(task) = task {
            self.tasks.lock().await.remove(&task);
            self.session.abort(task).await;
            info!(identifier, %task, "Preservation cancelled");
        }

        self.persist(&entry).await;
        self.notify(identifier, entry.state());
    }

    /// Read all persisted records, reconstruct them via the registry,
    /// and populate the content pool. Preserved records are validated
    /// for on-disk reachability and downgraded to ready when the file
    /// is gone. Idempotent: identifiers already in the pool are left
    /// untouched.
    #[instrument(skip(self))]
    pub async fn restore_at_startup(&self) -> Result<usize, StoreError> {
        let records = self.store.all().await?;
        let mut pool = self.pool.lock().await;
        let mut restored = 0;

        for (identifier, record) in records {
            if pool.contains_key(&identifier) {
                continue;
            }

            let Some(kind) = self.registry.reconstruct(&record.type_tag, &record.properties)
            else {
                let cause = if self.registry.is_registered(&record.type_tag) {
                    PreserveError::MalformedProperties(record.type_tag.clone())
                } else {
                    PreserveError::UnregisteredType(record.type_tag.clone())
                };
                warn!(%identifier, %cause, "Dropping unrestorable record");
                continue;
            };

            if kind.identifier() != identifier {
                warn!(
                    %identifier,
                    derived = %kind.identifier(),
                    "Dropping record whose key does not match its content"
                );
                continue;
            }

            let mut entry = OfflineContent::restored(kind, record.state.clone(), record.location());

            if record.state == OfflineState::Preserved {
                let reachable = match entry.location() {
                    Some(location) => {
                        let path = location.resolve(&self.roots);
                        fs::try_exists(&path).await.unwrap_or(false)
                    }
                    None => false,
                };

                if !reachable {
                    info!(%identifier, "Preserved resource is unrestorable, resetting to ready");
                    entry.downgrade();
                    if let Err(e) = self.store.set(&identifier, entry.to_record()).await {
                        warn!(%identifier, error = %e, "Failed to persist downgraded record");
                    }
                }
            }

            pool.insert(identifier, Arc::new(Mutex::new(entry)));
            restored += 1;
        }

        info!(restored, "Restored persisted offline contents");
        Ok(restored)
    }

    /// Pump session events into the handlers until the channel closes
    pub fn spawn_event_pump(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    SessionEvent::Progress {
                        task,
                        bytes_written,
                        total_bytes,
                    } => manager.on_progress(task, bytes_written, total_bytes).await,
                    SessionEvent::Finished {
                        task,
                        temp_path,
                        suggested_filename,
                    } => {
                        manager
                            .on_finished(task, &temp_path, suggested_filename.as_deref())
                            .await
                    }
                    SessionEvent::Failed { task, cause } => manager.on_failed(task, &cause).await,
                }
            }
        })
    }

    /// Handle a progress callback from the download session
    pub async fn on_progress(&self, task: TaskId, bytes_written: u64, total_bytes: Option<u64>) {
        let Some(entry) = self.entry_for_task(task).await else {
            return;
        };

        let fraction = match total_bytes {
            Some(total) if total > 0 => (bytes_written as f64 / total as f64) as f32,
            _ => UNKNOWN_SIZE_PROGRESS,
        };

        let mut entry = entry.lock().await;
        if entry.progress(task, fraction) {
            self.notify(entry.identifier(), entry.state());
        }
    }

    /// Handle a successful completion callback: move the payload to its
    /// final destination, verify it, transition, persist, acknowledge.
    pub async fn on_finished(&self, task: TaskId, temp_path: &Path, suggested_filename: Option<&str>) {
        let Some(entry) = self.entry_for_task(task).await else {
            debug!(%task, "Ignoring completion for untracked task");
            remove_quietly(temp_path).await;
            return;
        };

        let mut entry = entry.lock().await;

        if entry.task() != Some(task) {
            debug!(%task, identifier = %entry.identifier(), "Ignoring stale completion");
            remove_quietly(temp_path).await;
            return;
        }

        self.tasks.lock().await.remove(&task);

        match self.adopt_resource(&entry, temp_path, suggested_filename).await {
            Ok(location) => {
                info!(
                    identifier = %entry.identifier(),
                    path = %location.resolve(&self.roots).display(),
                    "Content preserved"
                );
                entry.finish(task, location);
            }
            Err(cause) => {
                warn!(identifier = %entry.identifier(), %cause, "Failed to adopt downloaded resource");
                entry.fail(Some(task), cause);
                remove_quietly(temp_path).await;
            }
        }

        self.persist(&entry).await;
        self.notify(entry.identifier(), entry.state());
        self.acknowledge().await;
    }

    /// Handle a completion-with-failure callback
    pub async fn on_failed(&self, task: TaskId, cause: &str) {
        let Some(entry) = self.entry_for_task(task).await else {
            debug!(%task, "Ignoring failure for untracked task");
            return;
        };

        let mut entry = entry.lock().await;

        if entry.task() != Some(task) {
            debug!(%task, identifier = %entry.identifier(), "Ignoring stale failure");
            return;
        }

        self.tasks.lock().await.remove(&task);

        warn!(identifier = %entry.identifier(), cause, "Preservation failed");
        entry.fail(Some(task), cause);

        self.persist(&entry).await;
        self.notify(entry.identifier(), entry.state());
        self.acknowledge().await;
    }

    /// Compute the destination, clear any duplicate, move the payload
    /// into place, and verify it is reachable
    async fn adopt_resource(
        &self,
        entry: &OfflineContent,
        temp_path: &Path,
        suggested_filename: Option<&str>,
    ) -> Result<ResourceLocation, String> {
        let name = paths::destination_name(&entry.display_name(), suggested_filename)
            .ok_or_else(|| PreserveError::ResourceIdentifierMissing.to_string())?;
        let location = ResourceLocation::new(name, RootKind::Persist);

        self.roots
            .ensure(RootKind::Persist)
            .await
            .map_err(|e| e.to_string())?;

        let destination = location.resolve(&self.roots);

        if fs::try_exists(&destination).await.unwrap_or(false) {
            warn!(path = %destination.display(), "Duplicate file detected, removing");
            fs::remove_file(&destination).await.map_err(|e| e.to_string())?;
        }

        move_file(temp_path, &destination)
            .await
            .map_err(|e| e.to_string())?;

        if !fs::try_exists(&destination).await.unwrap_or(false) {
            return Err(PreserveError::ResourceUnreachable(destination).to_string());
        }

        Ok(location)
    }

    /// Resolve an event's task handle to its pool entry.
    ///
    /// Falls back to scanning the pool for events that raced the task
    /// registration; the entry lock makes the scan observe the handle
    /// once `initiate_preservation` releases it.
    async fn entry_for_task(&self, task: TaskId) -> Option<Arc<Mutex<OfflineContent>>> {
        if let Some(identifier) = self.tasks.lock().await.get(&task).cloned() {
            return self.lookup(&identifier).await;
        }

        let entries: Vec<_> = self.pool.lock().await.values().cloned().collect();
        for entry in entries {
            if entry.lock().await.task() == Some(task) {
                return Some(entry);
            }
        }

        None
    }

    /// Write the entry's record through to the property store
    async fn persist(&self, entry: &OfflineContent) {
        if let Err(e) = self.store.set(entry.identifier(), entry.to_record()).await {
            warn!(identifier = %entry.identifier(), error = %e, "Failed to persist offline state");
        }
    }

    fn notify(&self, identifier: &str, state: &OfflineState) {
        let _ = self
            .changes
            .send(StateChange::new(identifier, state.clone()));
    }

    /// Invoke the background completion handler, at most once
    async fn acknowledge(&self) {
        if let Some(ack) = self.background_ack.lock().await.take() {
            ack();
        }
    }
}

/// Move a file, falling back to copy+remove across file systems
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }

    fs::copy(from, to).await?;
    fs::remove_file(from).await
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        debug!(path = %path.display(), error = %e, "Temporary file already gone");
    }
}
