//! Filesystem probes that report absence as a value, not an error.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;

use super::error::{SyncError, SyncResult};
use super::index::RootNotes;

/// What a path currently denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

fn is_absent(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}

/// Stat `path`, following symlinks. `Ok(None)` when nothing is there.
pub async fn probe(path: &Path) -> SyncResult<Option<EntryKind>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(EntryKind::File)),
        Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Dir)),
        Ok(_) => Ok(Some(EntryKind::Other)),
        Err(e) if is_absent(&e) => Ok(None),
        Err(e) => Err(SyncError::io(path, e)),
    }
}

/// Case-sensitive match of the final extension of `file_name` against
/// `extension` (which starts with `.`).
///
/// Dotfiles such as `.md` have no extension and never match.
pub fn matches_extension(file_name: &OsStr, extension: &str) -> bool {
    let Some(ext) = Path::new(file_name).extension() else {
        return false;
    };
    extension
        .strip_prefix('.')
        .is_some_and(|wanted| ext == OsStr::new(wanted))
}

/// File name with `extension` stripped.
pub fn display_name(file_name: &OsStr, extension: &str) -> String {
    let name = file_name.to_string_lossy();
    match name.strip_suffix(extension) {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => name.into_owned(),
    }
}

/// List the note files directly inside `folder`.
///
/// A missing folder yields an empty listing.
pub async fn list_notes(folder: &Path, extension: &str) -> SyncResult<RootNotes> {
    let mut notes = RootNotes::new();

    let mut entries = match tokio::fs::read_dir(folder).await {
        Ok(entries) => entries,
        Err(e) if is_absent(&e) => return Ok(notes),
        Err(e) => return Err(SyncError::io(folder, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SyncError::io(folder, e))?
    {
        let file_name = entry.file_name();
        if !matches_extension(&file_name, extension) {
            continue;
        }

        let path = entry.path();
        // Raced with a delete or not a plain file
        if probe(&path).await? != Some(EntryKind::File) {
            continue;
        }

        let name = display_name(&file_name, extension);
        notes.insert(path, name);
    }

    Ok(notes)
}
