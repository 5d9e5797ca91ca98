//! The notepad synchronizer: watcher topology, index upkeep and notifications.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ConfigSource;
use crate::workspace::{RootsChanged, WorkspaceRoots};

use super::backend::{
    EventSink, FsEventKind, NotifyBackend, RawEvent, WatchBackend, WatchGuard, WatchTarget,
};
use super::error::{SyncError, SyncResult};
use super::index::{Note, NotepadIndex, RootNotes};
use super::notifier::{ListenerRegistry, NoteChange, NoteChangedEvent, Subscription};
use super::probe::{EntryKind, display_name, list_notes, matches_extension, probe};

/// Watch state of one workspace root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootState {
    /// The notepad folder does not exist; the root itself is watched.
    AwaitingFolder,
    /// The notepad folder exists and is watched.
    Watching,
}

struct ArmedWatch {
    state: RootState,
    _guard: WatchGuard,
}

/// Watches armed by the current `setup()` generation.
#[derive(Default)]
struct WatcherSet {
    roots: IndexMap<PathBuf, ArmedWatch>,
}

struct Inner {
    config: Arc<dyn ConfigSource>,
    workspaces: Arc<dyn WorkspaceRoots>,
    backend: Arc<dyn WatchBackend>,
    /// Bumped by every teardown; callbacks carrying an older value are stale.
    generation: AtomicU64,
    index: RwLock<NotepadIndex>,
    watchers: Mutex<WatcherSet>,
    listeners: ListenerRegistry,
    events_tx: mpsc::UnboundedSender<RawEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<RawEvent>>>,
    /// Highest generation with no refresh pending.
    refreshed: watch::Sender<u64>,
    shutdown: CancellationToken,
}

/// Keeps an index of note files per workspace root in sync with disk.
///
/// Each workspace root is in one of two [`RootState`]s. While its notepad
/// folder is missing, the root is watched for the folder's creation; once the
/// folder exists, the folder is watched for note files appearing and
/// disappearing. Every `setup()` starts a new generation and discards the
/// previous generation's watches, and anything still in flight from an older
/// generation is dropped before it can touch the index.
pub struct NotepadSynchronizer {
    inner: Arc<Inner>,
}

impl NotepadSynchronizer {
    /// Create a builder for configuring the synchronizer.
    pub fn builder() -> NotepadSynchronizerBuilder {
        NotepadSynchronizerBuilder::new()
    }

    /// Spawn the dispatch loop that processes watcher events and workspace
    /// changes. Events are handled one at a time, in arrival order.
    pub fn start(&self) -> SyncResult<JoinHandle<()>> {
        let rx = self
            .inner
            .events_rx
            .lock()
            .take()
            .ok_or(SyncError::AlreadyStarted)?;
        let roots_rx = self.inner.workspaces.subscribe();
        let inner = Arc::clone(&self.inner);

        Ok(tokio::spawn(inner.dispatch(rx, roots_rx)))
    }

    /// Re-arm every watch and schedule a full refresh of the index.
    ///
    /// Returns once watches are armed; the refresh completes in the
    /// background. Use [`wait_refreshed`](Self::wait_refreshed) before
    /// relying on index contents.
    pub async fn setup(&self) {
        self.inner.setup().await;
    }

    /// Close every armed watch. Events already in flight are discarded.
    ///
    /// No refresh is pending afterwards, so [`wait_refreshed`](Self::wait_refreshed)
    /// returns immediately until the next `setup()`.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    /// Teardown and stop the dispatch loop.
    pub fn shutdown(&self) {
        self.inner.teardown();
        self.inner.shutdown.cancel();
    }

    /// Process one raw event directly, bypassing the dispatch loop.
    pub async fn handle_event(&self, event: RawEvent) {
        self.inner.handle_event(event).await;
    }

    /// Wait until no refresh is pending: the refresh scheduled by the latest
    /// `setup()` is committed, or watches were torn down since.
    ///
    /// Returns early if the synchronizer shuts down.
    pub async fn wait_refreshed(&self) {
        let mut rx = self.inner.refreshed.subscribe();
        loop {
            let target = self.inner.current_generation();
            if *rx.borrow_and_update() >= target {
                return;
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = self.inner.shutdown.cancelled() => return,
            }
        }
    }

    /// Observe the highest settled generation (refresh committed, or torn down).
    pub fn refreshed(&self) -> watch::Receiver<u64> {
        self.inner.refreshed.subscribe()
    }

    /// Indexed workspace roots, in enumeration order of the last refresh.
    pub fn workspace_roots(&self) -> Vec<PathBuf> {
        self.inner.index.read().roots()
    }

    /// Note paths of `root`; empty if the root is unknown.
    pub fn notes_in_workspace(&self, root: &Path) -> Vec<PathBuf> {
        self.inner.index.read().note_paths(root)
    }

    /// Notes of `root` with display names.
    pub fn notes(&self, root: &Path) -> Vec<Note> {
        self.inner.index.read().notes(root)
    }

    /// Register a listener for note changes.
    pub fn on_note_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NoteChangedEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    /// Receive note changes on a channel instead of a callback.
    pub fn note_changes(&self) -> (Subscription, mpsc::UnboundedReceiver<NoteChangedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.on_note_changed(move |event| {
            let _ = tx.send(event.clone());
        });
        (subscription, rx)
    }

    /// Watch state of `root` in the current generation.
    pub fn root_state(&self, root: &Path) -> Option<RootState> {
        self.inner
            .watchers
            .lock()
            .roots
            .get(root)
            .map(|armed| armed.state)
    }

    /// Number of armed watches.
    pub fn armed_count(&self) -> usize {
        self.inner.watchers.lock().roots.len()
    }

    /// Current generation token.
    pub fn generation(&self) -> u64 {
        self.inner.current_generation()
    }
}

impl Drop for NotepadSynchronizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn is_stale(&self, generation: u64) -> bool {
        self.current_generation() != generation
    }

    /// Raise the settled generation; never lowers it.
    fn mark_settled(&self, generation: u64) {
        self.refreshed.send_if_modified(|settled| {
            if generation > *settled {
                *settled = generation;
                true
            } else {
                false
            }
        });
    }

    /// Close all watches. Nothing is scheduled for the new generation.
    fn teardown(&self) -> u64 {
        let generation = self.retire();
        self.mark_settled(generation);
        generation
    }

    /// Close all watches and start a new generation.
    fn retire(&self) -> u64 {
        let (generation, closed) = {
            let mut watchers = self.watchers.lock();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (generation, std::mem::take(&mut watchers.roots))
        };

        if !closed.is_empty() {
            crate::debug_event!(
                "sync",
                "torn down",
                "{} watches, now generation {generation}",
                closed.len()
            );
        }
        drop(closed);
        generation
    }

    async fn setup(self: &Arc<Self>) {
        // The refresh spawned below settles this generation
        let generation = self.retire();
        let config = self.config.notepad();
        let roots = self.workspaces.current_roots();

        crate::log_event!(
            "sync",
            "setup",
            "generation {generation}, {} roots",
            roots.len()
        );

        // Patches from this generation's watches are replayed onto the refresh
        self.index.write().begin_rebuild(generation);

        let mut armed = IndexMap::new();
        for root in &roots {
            let folder = root.join(&config.folder_name);
            let folder_exists = match probe(&folder).await {
                Ok(kind) => kind == Some(EntryKind::Dir),
                Err(e) => {
                    tracing::error!("[sync] cannot probe {}: {e}", folder.display());
                    false
                }
            };

            let (target, dir, state) = if folder_exists {
                (WatchTarget::Notepad, folder, RootState::Watching)
            } else {
                (WatchTarget::Root, root.clone(), RootState::AwaitingFolder)
            };

            let sink = EventSink::new(generation, root.clone(), target, self.events_tx.clone());
            match self.backend.watch(&dir, sink) {
                Ok(guard) => {
                    crate::debug_event!("sync", "armed", "{state:?} {}", dir.display());
                    armed.insert(
                        root.clone(),
                        ArmedWatch {
                            state,
                            _guard: guard,
                        },
                    );
                }
                Err(e) => tracing::error!("[sync] {e}"),
            }
        }

        let installed = {
            let mut watchers = self.watchers.lock();
            if self.is_stale(generation) {
                false
            } else {
                watchers.roots = std::mem::take(&mut armed);
                true
            }
        };
        // Watches of a superseded setup close here, outside the lock
        drop(armed);

        if !installed {
            crate::debug_event!("sync", "stale setup", "generation {generation}");
            return;
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.refresh(generation, roots).await;
        });
    }

    /// Rebuild the index from disk for `roots`, committing only if
    /// `generation` is still current.
    async fn refresh(&self, generation: u64, roots: Vec<PathBuf>) {
        let config = self.config.notepad();
        let extension = config.extension();

        let mut rebuilt: IndexMap<PathBuf, RootNotes> = IndexMap::new();
        for root in roots {
            if self.is_stale(generation) {
                crate::debug_event!("sync", "stale refresh", "generation {generation}");
                return;
            }

            let folder = root.join(&config.folder_name);
            let notes = match list_notes(&folder, &extension).await {
                Ok(notes) => notes,
                Err(e) => {
                    tracing::error!("[sync] refresh of {} failed: {e}", root.display());
                    RootNotes::new()
                }
            };
            rebuilt.insert(root, notes);
        }

        let committed = {
            let mut index = self.index.write();
            !self.is_stale(generation) && index.commit_rebuild(generation, rebuilt)
        };

        if committed {
            let index = self.index.read();
            crate::log_event!(
                "sync",
                "refreshed",
                "{} notes in {} roots",
                index.note_count(),
                index.roots().len()
            );
            drop(index);
            self.mark_settled(generation);
        } else {
            crate::debug_event!("sync", "stale refresh", "generation {generation}");
        }
    }

    async fn handle_event(self: &Arc<Self>, event: RawEvent) {
        if self.is_stale(event.generation) {
            crate::debug_event!(
                "sync",
                "stale event",
                "generation {} for {}",
                event.generation,
                event.root.display()
            );
            return;
        }

        match event.target {
            WatchTarget::Root => self.on_root_event(event).await,
            WatchTarget::Notepad => {
                if let Err(e) = self.on_notepad_event(event).await {
                    tracing::error!("[sync] error handling notepad event: {e}");
                }
            }
        }
    }

    /// The notepad folder may have been created under a watched root.
    async fn on_root_event(self: &Arc<Self>, event: RawEvent) {
        let config = self.config.notepad();
        if event.kind != FsEventKind::Rename
            || event.file_name.as_deref() != Some(OsStr::new(&config.folder_name))
        {
            return;
        }

        crate::log_event!("sync", "notepad folder appeared", "{}", event.root.display());
        // Folder appearance changes the watch topology; rebuild from scratch
        self.setup().await;
    }

    async fn on_notepad_event(self: &Arc<Self>, event: RawEvent) -> SyncResult<()> {
        let Some(file_name) = event.file_name else {
            return Ok(());
        };
        if event.kind != FsEventKind::Rename {
            return Ok(());
        }

        let config = self.config.notepad();
        let folder = event.root.join(&config.folder_name);

        // Some platforms report removal of the watched folder itself
        if file_name.as_os_str() == OsStr::new(&config.folder_name)
            && probe(&folder).await?.is_none()
        {
            if self.is_stale(event.generation) {
                return Ok(());
            }
            crate::log_event!("sync", "notepad folder removed", "{}", event.root.display());
            self.setup().await;
            return Ok(());
        }

        let extension = config.extension();
        if !matches_extension(&file_name, &extension) {
            return Ok(());
        }

        let note_path = folder.join(&file_name);
        let change = match probe(&note_path).await? {
            None => NoteChange::Removed,
            Some(EntryKind::File) => NoteChange::Updated,
            Some(_) => {
                crate::debug_event!("sync", "not a file", "{}", note_path.display());
                return Ok(());
            }
        };

        let applied = {
            let mut index = self.index.write();
            // A teardown may have run while probing; it bumps the generation
            // before any later setup can begin a rebuild
            if self.is_stale(event.generation) {
                false
            } else {
                match change {
                    NoteChange::Removed => index.remove(&event.root, &note_path),
                    NoteChange::Updated => {
                        let name = display_name(&file_name, &extension);
                        index.upsert(&event.root, note_path.clone(), name);
                        true
                    }
                }
            }
        };

        if !applied {
            crate::debug_event!(
                "sync",
                "index unchanged",
                "{:?} {}",
                change,
                note_path.display()
            );
            return Ok(());
        }

        crate::log_event!("sync", "note changed", "{:?} {}", change, note_path.display());
        self.listeners.emit(&NoteChangedEvent {
            workspace_root: event.root,
            note_path,
            change,
        });

        Ok(())
    }

    async fn dispatch(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<RawEvent>,
        mut roots: broadcast::Receiver<RootsChanged>,
    ) {
        crate::log_event!("sync", "started");
        let mut roots_open = true;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,

                Some(event) = events.recv() => {
                    self.handle_event(event).await;
                }

                change = roots.recv(), if roots_open => match change {
                    Ok(change) => {
                        crate::log_event!(
                            "sync",
                            "workspace roots changed",
                            "+{} -{}",
                            change.added.len(),
                            change.removed.len()
                        );
                        self.setup().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("[sync] lagged by {n} workspace changes");
                        self.setup().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        crate::debug_event!("sync", "workspace feed closed");
                        roots_open = false;
                    }
                },
            }
        }

        crate::log_event!("sync", "stopped");
    }
}

/// Builder for constructing a NotepadSynchronizer.
pub struct NotepadSynchronizerBuilder {
    config: Option<Arc<dyn ConfigSource>>,
    workspaces: Option<Arc<dyn WorkspaceRoots>>,
    backend: Option<Arc<dyn WatchBackend>>,
}

impl NotepadSynchronizerBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            config: None,
            workspaces: None,
            backend: None,
        }
    }

    /// Set the configuration source.
    pub fn config<C: ConfigSource + 'static>(mut self, config: Arc<C>) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the workspace root enumerator.
    pub fn workspaces<W: WorkspaceRoots + 'static>(mut self, workspaces: Arc<W>) -> Self {
        self.workspaces = Some(workspaces);
        self
    }

    /// Set the watch backend (defaults to [`NotifyBackend`]).
    pub fn backend<B: WatchBackend + 'static>(mut self, backend: Arc<B>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the NotepadSynchronizer.
    pub fn build(self) -> SyncResult<NotepadSynchronizer> {
        let config = self.config.ok_or_else(|| SyncError::InitFailed {
            reason: "Config source is required".to_string(),
        })?;

        let workspaces = self.workspaces.ok_or_else(|| SyncError::InitFailed {
            reason: "Workspace roots are required".to_string(),
        })?;

        let backend: Arc<dyn WatchBackend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(NotifyBackend::new()),
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (refreshed, _) = watch::channel(0);

        Ok(NotepadSynchronizer {
            inner: Arc::new(Inner {
                config,
                workspaces,
                backend,
                generation: AtomicU64::new(0),
                index: RwLock::new(NotepadIndex::new()),
                watchers: Mutex::new(WatcherSet::default()),
                listeners: ListenerRegistry::new(),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                refreshed,
                shutdown: CancellationToken::new(),
            }),
        })
    }
}

impl Default for NotepadSynchronizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotepadConfig;
    use crate::workspace::WorkspaceSet;
    use std::ffi::OsString;
    use std::fs;
    use tempfile::TempDir;

    /// Backend that arms nothing; events are fed through `handle_event`.
    struct NullBackend;

    impl WatchBackend for NullBackend {
        fn watch(&self, _dir: &Path, _sink: EventSink) -> SyncResult<WatchGuard> {
            Ok(Box::new(()))
        }
    }

    fn synchronizer(roots: Vec<PathBuf>) -> NotepadSynchronizer {
        NotepadSynchronizer::builder()
            .config(Arc::new(NotepadConfig::default()))
            .workspaces(Arc::new(WorkspaceSet::new(roots)))
            .backend(Arc::new(NullBackend))
            .build()
            .unwrap()
    }

    fn notepad_event(sync: &NotepadSynchronizer, root: &Path, name: &str) -> RawEvent {
        RawEvent {
            generation: sync.generation(),
            root: root.to_path_buf(),
            target: WatchTarget::Notepad,
            kind: FsEventKind::Rename,
            file_name: Some(OsString::from(name)),
        }
    }

    #[test]
    fn test_builder_requires_config() {
        let result = NotepadSynchronizer::builder()
            .workspaces(Arc::new(WorkspaceSet::new(Vec::new())))
            .build();
        assert!(matches!(result, Err(SyncError::InitFailed { .. })));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let sync = synchronizer(Vec::new());
        let _handle = sync.start().unwrap();
        assert!(matches!(sync.start(), Err(SyncError::AlreadyStarted)));
        sync.shutdown();
    }

    #[tokio::test]
    async fn test_setup_indexes_existing_notes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        let folder = root.join(".notepad");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("2024-01-01 Groceries.md"), "").unwrap();

        let sync = synchronizer(vec![root.clone()]);
        sync.setup().await;
        sync.wait_refreshed().await;

        let notes = sync.notes(&root);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].name, "2024-01-01 Groceries");
        assert_eq!(sync.root_state(&root), Some(RootState::Watching));
    }

    #[tokio::test]
    async fn test_teardown_clears_watches_and_bumps_generation() {
        let temp_dir = TempDir::new().unwrap();
        let sync = synchronizer(vec![temp_dir.path().to_path_buf()]);

        sync.setup().await;
        let generation = sync.generation();
        assert_eq!(sync.armed_count(), 1);

        sync.teardown();
        assert_eq!(sync.armed_count(), 0);
        assert_eq!(sync.generation(), generation + 1);
    }

    #[tokio::test]
    async fn test_wait_refreshed_returns_after_teardown() {
        let temp_dir = TempDir::new().unwrap();
        let sync = synchronizer(vec![temp_dir.path().to_path_buf()]);
        let wait = std::time::Duration::from_secs(2);

        sync.setup().await;
        tokio::time::timeout(wait, sync.wait_refreshed())
            .await
            .unwrap();

        sync.teardown();
        tokio::time::timeout(wait, sync.wait_refreshed())
            .await
            .expect("nothing is pending after teardown");
        assert_eq!(*sync.refreshed().borrow(), sync.generation());

        // A later setup is waited on again
        sync.setup().await;
        tokio::time::timeout(wait, sync.wait_refreshed())
            .await
            .unwrap();
        assert_eq!(*sync.refreshed().borrow(), sync.generation());
    }

    #[tokio::test]
    async fn test_late_refresh_does_not_lower_settled_generation() {
        let temp_dir = TempDir::new().unwrap();
        let sync = synchronizer(vec![temp_dir.path().to_path_buf()]);

        sync.inner.mark_settled(5);
        sync.inner.mark_settled(3);
        assert_eq!(*sync.refreshed().borrow(), 5);
    }

    #[tokio::test]
    async fn test_stale_event_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        fs::create_dir(root.join(".notepad")).unwrap();

        let sync = synchronizer(vec![root.clone()]);
        sync.setup().await;
        sync.wait_refreshed().await;

        let event = notepad_event(&sync, &root, "late.md");
        fs::write(root.join(".notepad").join("late.md"), "").unwrap();
        sync.teardown();

        sync.handle_event(event).await;
        assert!(sync.notes_in_workspace(&root).is_empty());
    }

    #[tokio::test]
    async fn test_change_events_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        fs::create_dir(root.join(".notepad")).unwrap();

        let sync = synchronizer(vec![root.clone()]);
        sync.setup().await;
        sync.wait_refreshed().await;
        fs::write(root.join(".notepad").join("a.md"), "").unwrap();

        let mut event = notepad_event(&sync, &root, "a.md");
        event.kind = FsEventKind::Change;
        sync.handle_event(event).await;
        assert!(sync.notes_in_workspace(&root).is_empty());

        sync.handle_event(RawEvent {
            file_name: None,
            ..notepad_event(&sync, &root, "a.md")
        })
        .await;
        assert!(sync.notes_in_workspace(&root).is_empty());
    }

    #[tokio::test]
    async fn test_directory_with_note_extension_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        fs::create_dir_all(root.join(".notepad").join("folder.md")).unwrap();

        let sync = synchronizer(vec![root.clone()]);
        sync.setup().await;
        sync.wait_refreshed().await;

        let (_sub, mut rx) = sync.note_changes();
        sync.handle_event(notepad_event(&sync, &root, "folder.md")).await;

        assert!(sync.notes_in_workspace(&root).is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_config_is_read_per_operation() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        fs::create_dir(root.join("journal")).unwrap();
        fs::write(root.join("journal").join("day.txt"), "").unwrap();

        let config = Arc::new(crate::config::SharedConfig::new(NotepadConfig::default()));
        let sync = NotepadSynchronizer::builder()
            .config(config.clone())
            .workspaces(Arc::new(WorkspaceSet::new(vec![root.clone()])))
            .backend(Arc::new(NullBackend))
            .build()
            .unwrap();

        sync.setup().await;
        sync.wait_refreshed().await;
        assert!(sync.notes_in_workspace(&root).is_empty());
        assert_eq!(sync.root_state(&root), Some(RootState::AwaitingFolder));

        config.replace(NotepadConfig {
            folder_name: "journal".to_string(),
            file_extension: "txt".to_string(),
            ..NotepadConfig::default()
        });
        sync.setup().await;
        sync.wait_refreshed().await;

        assert_eq!(
            sync.notes_in_workspace(&root),
            vec![root.join("journal").join("day.txt")]
        );
        assert_eq!(sync.root_state(&root), Some(RootState::Watching));
    }
}
