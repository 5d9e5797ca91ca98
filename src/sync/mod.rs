//! Filesystem synchronization core.
//!
//! Discovers one notepad folder per workspace root, keeps an in-memory index
//! of the note files inside it, and notifies listeners when notes change.
//!
//! # Architecture
//!
//! ```text
//! NotepadSynchronizer
//!   - one watch per workspace root, tagged with a setup generation
//!       AwaitingFolder: watches the root for the folder's creation
//!       Watching:       watches the notepad folder for note files
//!   - NotepadIndex (root -> note path -> display name)
//!   - ListenerRegistry (NoteChangedEvent observers)
//!         |
//!   WatchBackend (NotifyBackend) --RawEvent--> dispatch loop
//! ```

mod backend;
mod error;
mod index;
mod notifier;
mod probe;
mod synchronizer;

pub use backend::{
    EventSink, FsEventKind, NotifyBackend, RawEvent, WatchBackend, WatchGuard, WatchTarget,
    classify,
};
pub use error::{SyncError, SyncResult};
pub use index::{Note, NotepadIndex, RootNotes};
pub use notifier::{ListenerRegistry, NoteChange, NoteChangedEvent, Subscription};
pub use probe::{EntryKind, display_name, list_notes, matches_extension, probe};
pub use synchronizer::{NotepadSynchronizer, NotepadSynchronizerBuilder, RootState};
