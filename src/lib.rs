//! Per-workspace notepad folders kept in sync with the filesystem.
//!
//! The [`sync`] module holds the synchronization core; [`config`],
//! [`workspace`] and [`create`] are the collaborators it reads from or
//! that consume it.

pub mod cli;
pub mod config;
pub mod create;
pub mod logging;
pub mod sync;
pub mod workspace;

pub use config::{ConfigSource, NotepadConfig, Settings, SharedConfig};
pub use create::{CreateNoteError, create_note};
pub use sync::{
    Note, NoteChange, NoteChangedEvent, NotepadSynchronizer, RootState, Subscription, SyncError,
};
pub use workspace::{RootsChanged, WorkspaceRoots, WorkspaceSet};
