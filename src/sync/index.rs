//! In-memory index of note files per workspace root.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// Note files of one workspace root: path -> display name.
pub type RootNotes = IndexMap<PathBuf, String>;

/// A note as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub path: PathBuf,
    /// File name with the note extension stripped.
    pub name: String,
}

#[derive(Debug, Clone)]
enum Patch {
    Upsert {
        root: PathBuf,
        path: PathBuf,
        name: String,
    },
    Remove {
        root: PathBuf,
        path: PathBuf,
    },
}

/// Incremental patches recorded while a full rebuild is in flight.
#[derive(Debug)]
struct PendingRebuild {
    generation: u64,
    journal: Vec<Patch>,
}

/// Mapping of workspace root -> note files.
///
/// Rebuilt wholesale by a full refresh and patched by individual watcher
/// events in between. Deleted notes are removed outright rather than marked.
#[derive(Debug, Default)]
pub struct NotepadIndex {
    roots: IndexMap<PathBuf, RootNotes>,
    pending: Option<PendingRebuild>,
}

impl NotepadIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// All indexed workspace roots, in the order of the last rebuild.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.keys().cloned().collect()
    }

    /// Note paths of a root; empty if the root is unknown.
    pub fn note_paths(&self, root: &Path) -> Vec<PathBuf> {
        self.roots
            .get(root)
            .map(|notes| notes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Notes of a root with their display names; empty if the root is unknown.
    pub fn notes(&self, root: &Path) -> Vec<Note> {
        self.roots
            .get(root)
            .map(|notes| {
                notes
                    .iter()
                    .map(|(path, name)| Note {
                        path: path.clone(),
                        name: name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Display name of an indexed note.
    pub fn name_of(&self, root: &Path, path: &Path) -> Option<&str> {
        self.roots
            .get(root)
            .and_then(|notes| notes.get(path))
            .map(String::as_str)
    }

    /// Total number of notes across roots.
    pub fn note_count(&self) -> usize {
        self.roots.values().map(IndexMap::len).sum()
    }

    /// Insert or overwrite a note.
    pub fn upsert(&mut self, root: &Path, path: PathBuf, name: String) {
        if let Some(pending) = self.pending.as_mut() {
            pending.journal.push(Patch::Upsert {
                root: root.to_path_buf(),
                path: path.clone(),
                name: name.clone(),
            });
        }
        self.roots
            .entry(root.to_path_buf())
            .or_default()
            .insert(path, name);
    }

    /// Remove a note. Returns whether it was indexed.
    pub fn remove(&mut self, root: &Path, path: &Path) -> bool {
        if let Some(pending) = self.pending.as_mut() {
            pending.journal.push(Patch::Remove {
                root: root.to_path_buf(),
                path: path.to_path_buf(),
            });
        }
        self.roots
            .get_mut(root)
            .is_some_and(|notes| notes.shift_remove(path).is_some())
    }

    /// Start journaling patches for a rebuild of `generation`.
    ///
    /// Replaces any rebuild still pending from an older generation.
    pub fn begin_rebuild(&mut self, generation: u64) {
        self.pending = Some(PendingRebuild {
            generation,
            journal: Vec::new(),
        });
    }

    /// Replace the whole mapping with `rebuilt`, then replay patches applied
    /// since [`begin_rebuild`](Self::begin_rebuild).
    ///
    /// Returns false and leaves the index untouched when no rebuild of
    /// `generation` is pending.
    pub fn commit_rebuild(
        &mut self,
        generation: u64,
        mut rebuilt: IndexMap<PathBuf, RootNotes>,
    ) -> bool {
        let journal = match self.pending.take() {
            Some(pending) if pending.generation == generation => pending.journal,
            other => {
                self.pending = other;
                return false;
            }
        };

        for patch in journal {
            match patch {
                Patch::Upsert { root, path, name } => {
                    if let Some(notes) = rebuilt.get_mut(&root) {
                        notes.insert(path, name);
                    }
                }
                Patch::Remove { root, path } => {
                    if let Some(notes) = rebuilt.get_mut(&root) {
                        notes.shift_remove(&path);
                    }
                }
            }
        }

        self.roots = rebuilt;
        true
    }

    /// Whether a rebuild is waiting to be committed.
    pub fn rebuild_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root_notes(entries: &[(&str, &str)]) -> RootNotes {
        entries
            .iter()
            .map(|(p, n)| (PathBuf::from(p), n.to_string()))
            .collect()
    }

    #[test]
    fn test_unknown_root_is_empty() {
        let index = NotepadIndex::new();
        assert!(index.note_paths(Path::new("/nope")).is_empty());
        assert!(index.notes(Path::new("/nope")).is_empty());
        assert!(index.roots().is_empty());
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut index = NotepadIndex::new();
        let root = Path::new("/ws");
        let note = PathBuf::from("/ws/.notepad/a.md");

        index.upsert(root, note.clone(), "a".to_string());
        assert_eq!(index.name_of(root, &note), Some("a"));
        assert_eq!(index.note_count(), 1);

        assert!(index.remove(root, &note));
        assert!(!index.remove(root, &note));
        assert!(index.note_paths(root).is_empty());
        // Root stays tracked after its last note is deleted
        assert_eq!(index.roots(), vec![PathBuf::from("/ws")]);
    }

    #[test]
    fn test_commit_replaces_wholesale() {
        let mut index = NotepadIndex::new();
        index.upsert(Path::new("/old"), PathBuf::from("/old/n/x.md"), "x".into());

        let mut rebuilt = IndexMap::new();
        rebuilt.insert(PathBuf::from("/b"), root_notes(&[("/b/n/1.md", "1")]));
        rebuilt.insert(PathBuf::from("/a"), RootNotes::new());

        index.begin_rebuild(1);
        assert!(index.rebuild_pending());
        assert!(index.commit_rebuild(1, rebuilt));
        assert!(!index.rebuild_pending());

        assert_eq!(index.roots(), vec![PathBuf::from("/b"), PathBuf::from("/a")]);
        assert!(index.note_paths(Path::new("/old")).is_empty());
    }

    #[test]
    fn test_commit_replays_journal() {
        let mut index = NotepadIndex::new();
        let root = Path::new("/ws");
        index.begin_rebuild(3);

        // Patches landing between the listing and the commit
        index.upsert(root, PathBuf::from("/ws/n/new.md"), "new".into());
        index.remove(root, Path::new("/ws/n/gone.md"));

        let mut rebuilt = IndexMap::new();
        rebuilt.insert(
            PathBuf::from("/ws"),
            root_notes(&[("/ws/n/gone.md", "gone"), ("/ws/n/kept.md", "kept")]),
        );
        assert!(index.commit_rebuild(3, rebuilt));

        let mut paths = index.note_paths(root);
        paths.sort();
        assert_eq!(
            paths,
            vec![PathBuf::from("/ws/n/kept.md"), PathBuf::from("/ws/n/new.md")]
        );
    }

    #[test]
    fn test_stale_commit_is_rejected() {
        let mut index = NotepadIndex::new();
        index.begin_rebuild(1);
        index.begin_rebuild(2);

        let mut rebuilt = IndexMap::new();
        rebuilt.insert(PathBuf::from("/ws"), RootNotes::new());

        assert!(!index.commit_rebuild(1, rebuilt.clone()));
        assert!(index.roots().is_empty());
        assert!(index.rebuild_pending());
        assert!(index.commit_rebuild(2, rebuilt));
    }
}
