//! Watch backends: arm a non-recursive directory watch and forward events.
//!
//! Every watch is tagged with the setup generation that armed it, so the
//! synchronizer can drop events delivered after a teardown.

use std::any::Any;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::{SyncError, SyncResult};

/// Which directory a watch observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTarget {
    /// The workspace root, waiting for the notepad folder to appear.
    Root,
    /// The notepad folder itself.
    Notepad,
}

/// Platform-neutral event class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    /// Creation, deletion or rename. Ambiguous by nature; resolved by re-stat.
    Rename,
    /// Content or metadata change of an existing entry.
    Change,
}

/// One filesystem event as seen by the synchronizer.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub generation: u64,
    pub root: PathBuf,
    pub target: WatchTarget,
    pub kind: FsEventKind,
    /// Name of the changed entry inside the watched directory, if reported.
    pub file_name: Option<OsString>,
}

/// Sender half handed to a backend for one armed watch.
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    root: PathBuf,
    target: WatchTarget,
    tx: mpsc::UnboundedSender<RawEvent>,
}

impl EventSink {
    pub fn new(
        generation: u64,
        root: PathBuf,
        target: WatchTarget,
        tx: mpsc::UnboundedSender<RawEvent>,
    ) -> Self {
        Self {
            generation,
            root,
            target,
            tx,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self) -> WatchTarget {
        self.target
    }

    /// Forward an event. Returns false once the synchronizer has gone away.
    pub fn emit(&self, kind: FsEventKind, file_name: Option<OsString>) -> bool {
        self.tx
            .send(RawEvent {
                generation: self.generation,
                root: self.root.clone(),
                target: self.target,
                kind,
                file_name,
            })
            .is_ok()
    }
}

/// Dropping the guard closes the watch.
pub type WatchGuard = Box<dyn Any + Send>;

/// Arms directory watches.
pub trait WatchBackend: Send + Sync {
    /// Watch `dir` (non-recursively), delivering its events into `sink`.
    fn watch(&self, dir: &Path, sink: EventSink) -> SyncResult<WatchGuard>;
}

/// Backend using the platform's recommended `notify` watcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

impl NotifyBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Map a notify event kind onto the synchronizer's event classes.
pub fn classify(kind: &EventKind) -> Option<FsEventKind> {
    match kind {
        EventKind::Create(_) | EventKind::Remove(_) => Some(FsEventKind::Rename),
        EventKind::Modify(ModifyKind::Name(_)) => Some(FsEventKind::Rename),
        EventKind::Modify(_) => Some(FsEventKind::Change),
        // Unknown kinds may hide a create or delete; re-stat resolves them
        EventKind::Any => Some(FsEventKind::Rename),
        EventKind::Access(_) | EventKind::Other => None,
    }
}

fn forward(sink: &EventSink, event: Event) {
    let Some(kind) = classify(&event.kind) else {
        return;
    };

    if event.paths.is_empty() {
        sink.emit(kind, None);
        return;
    }

    for path in event.paths {
        sink.emit(kind, path.file_name().map(|n| n.to_os_string()));
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(&self, dir: &Path, sink: EventSink) -> SyncResult<WatchGuard> {
        let callback_sink = sink.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => forward(&callback_sink, event),
            Err(e) => tracing::error!("[watch] file watch error: {e}"),
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| SyncError::WatchFailed {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        crate::debug_event!(
            "watch",
            "armed",
            "{:?} {} (generation {})",
            sink.target(),
            dir.display(),
            sink.generation()
        );
        Ok(Box::new(watcher))
    }
}
