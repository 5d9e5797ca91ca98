//! Workspace root enumeration.
//!
//! The synchronizer never creates or destroys workspace roots; it only reads
//! the current set and reacts when it changes.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Notification that the set of workspace roots changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootsChanged {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Enumerator of workspace roots plus a change feed.
pub trait WorkspaceRoots: Send + Sync {
    /// Current roots, in display order.
    fn current_roots(&self) -> Vec<PathBuf>;

    /// Subscribe to root additions and removals.
    fn subscribe(&self) -> broadcast::Receiver<RootsChanged>;
}

/// In-memory set of workspace roots.
pub struct WorkspaceSet {
    roots: RwLock<Vec<PathBuf>>,
    sender: broadcast::Sender<RootsChanged>,
}

impl WorkspaceSet {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let (sender, _) = broadcast::channel(16);
        let mut unique: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !unique.contains(&root) {
                unique.push(root);
            }
        }
        Self {
            roots: RwLock::new(unique),
            sender,
        }
    }

    /// Add a root. Returns false if it was already present.
    pub fn add(&self, root: PathBuf) -> bool {
        {
            let mut roots = self.roots.write();
            if roots.contains(&root) {
                return false;
            }
            roots.push(root.clone());
        }
        self.notify(RootsChanged {
            added: vec![root],
            removed: Vec::new(),
        });
        true
    }

    /// Remove a root. Returns false if it was not present.
    pub fn remove(&self, root: &Path) -> bool {
        {
            let mut roots = self.roots.write();
            let before = roots.len();
            roots.retain(|r| r != root);
            if roots.len() == before {
                return false;
            }
        }
        self.notify(RootsChanged {
            added: Vec::new(),
            removed: vec![root.to_path_buf()],
        });
        true
    }

    /// Replace every root at once. Notifies only if the set differs.
    pub fn set(&self, new_roots: Vec<PathBuf>) {
        let change = {
            let mut roots = self.roots.write();
            let added: Vec<PathBuf> = new_roots
                .iter()
                .filter(|r| !roots.contains(r))
                .cloned()
                .collect();
            let removed: Vec<PathBuf> = roots
                .iter()
                .filter(|r| !new_roots.contains(r))
                .cloned()
                .collect();
            *roots = new_roots;
            RootsChanged { added, removed }
        };

        if !change.added.is_empty() || !change.removed.is_empty() {
            self.notify(change);
        }
    }

    fn notify(&self, change: RootsChanged) {
        match self.sender.send(change) {
            Ok(count) => crate::debug_event!("workspace", "changed", "{count} subscribers"),
            // No receivers, this is fine
            Err(_) => crate::debug_event!("workspace", "changed", "no subscribers"),
        }
    }
}

impl WorkspaceRoots for WorkspaceSet {
    fn current_roots(&self) -> Vec<PathBuf> {
        self.roots.read().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<RootsChanged> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_deduplicates() {
        let set = WorkspaceSet::new(vec![
            PathBuf::from("/a"),
            PathBuf::from("/b"),
            PathBuf::from("/a"),
        ]);
        assert_eq!(
            set.current_roots(),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn test_add_remove_notify() {
        let set = WorkspaceSet::new(Vec::new());
        let mut rx = set.subscribe();

        assert!(set.add(PathBuf::from("/a")));
        assert!(!set.add(PathBuf::from("/a")));
        assert!(set.remove(Path::new("/a")));
        assert!(!set.remove(Path::new("/a")));

        let first = rx.try_recv().unwrap();
        assert_eq!(first.added, vec![PathBuf::from("/a")]);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.removed, vec![PathBuf::from("/a")]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_set_only_notifies_on_difference() {
        let set = WorkspaceSet::new(vec![PathBuf::from("/a")]);
        let mut rx = set.subscribe();

        set.set(vec![PathBuf::from("/a")]);
        assert!(rx.try_recv().is_err());

        set.set(vec![PathBuf::from("/b")]);
        let change = rx.try_recv().unwrap();
        assert_eq!(change.added, vec![PathBuf::from("/b")]);
        assert_eq!(change.removed, vec![PathBuf::from("/a")]);
    }
}
