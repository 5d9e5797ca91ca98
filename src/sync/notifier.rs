//! Note change notifications.
//!
//! An explicit observer registry: listeners are plain callbacks keyed by id,
//! and the returned [`Subscription`] removes its listener when dropped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// What happened to the note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteChange {
    /// Created, renamed into place, or rewritten.
    Updated,
    /// Removed from the index after it disappeared from disk.
    Removed,
}

/// Emitted when the index entry of a note is inserted, overwritten or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteChangedEvent {
    pub workspace_root: PathBuf,
    pub note_path: PathBuf,
    pub change: NoteChange,
}

type Listener = Arc<dyn Fn(&NoteChangedEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Listener list shared between the synchronizer and subscription handles.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered while the returned handle lives.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NoteChangedEvent) + Send + Sync + 'static,
    {
        let mut registry = self.inner.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));

        Subscription {
            id: Some(id),
            registry: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// A panicking listener is logged and skipped. Returns how many
    /// listeners completed.
    pub fn emit(&self, event: &NoteChangedEvent) -> usize {
        // Call outside the lock so listeners may subscribe or unsubscribe
        let listeners: Vec<Listener> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        let mut delivered = 0;
        for listener in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::error!(
                        "[notify] listener panicked on {}",
                        event.note_path.display()
                    );
                }
            }
        }

        crate::debug_event!(
            "notify",
            "note changed",
            "{:?} {} to {delivered} listeners",
            event.change,
            event.note_path.display()
        );
        delivered
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: Option<u64>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Unsubscribe now.
    pub fn dispose(mut self) {
        self.unsubscribe();
    }

    /// Keep the listener registered for the registry's whole lifetime.
    pub fn forget(mut self) {
        self.id = None;
    }

    fn unsubscribe(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().listeners.retain(|(lid, _)| *lid != id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
