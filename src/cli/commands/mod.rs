//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod init;
pub mod list;
pub mod new;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::config::{SharedConfig, Settings};
use crate::sync::NotepadSynchronizer;
use crate::workspace::WorkspaceSet;

/// Workspace roots from the command line, else from config, else the
/// current directory. Relative paths are made absolute.
pub fn resolve_roots(cli_roots: &[PathBuf], settings: &Settings) -> anyhow::Result<Vec<PathBuf>> {
    let roots = if !cli_roots.is_empty() {
        cli_roots.to_vec()
    } else if !settings.workspace_roots.is_empty() {
        settings.workspace_roots.clone()
    } else {
        vec![std::env::current_dir().context("cannot read current directory")?]
    };

    roots
        .into_iter()
        .map(|root| {
            std::path::absolute(&root)
                .with_context(|| format!("cannot resolve workspace root {}", root.display()))
        })
        .collect()
}

/// Synchronizer over `roots` using the notify backend.
pub fn build_synchronizer(
    settings: &Settings,
    roots: Vec<PathBuf>,
) -> anyhow::Result<(NotepadSynchronizer, Arc<WorkspaceSet>)> {
    let workspaces = Arc::new(WorkspaceSet::new(roots));
    let sync = NotepadSynchronizer::builder()
        .config(Arc::new(SharedConfig::new(settings.notepad.clone())))
        .workspaces(workspaces.clone())
        .build()?;
    Ok((sync, workspaces))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_roots_precedence() {
        let mut settings = Settings::default();
        settings.workspace_roots = vec![PathBuf::from("/from/config")];

        let roots = resolve_roots(&[PathBuf::from("/from/cli")], &settings).unwrap();
        assert_eq!(roots, vec![PathBuf::from("/from/cli")]);

        let roots = resolve_roots(&[], &settings).unwrap();
        assert_eq!(roots, vec![PathBuf::from("/from/config")]);

        let roots = resolve_roots(&[], &Settings::default()).unwrap();
        assert_eq!(roots, vec![std::env::current_dir().unwrap()]);
    }

    #[test]
    fn test_relative_roots_become_absolute() {
        let roots = resolve_roots(&[PathBuf::from("ws")], &Settings::default()).unwrap();
        assert!(roots[0].is_absolute());
        assert!(roots[0].ends_with("ws"));
    }
}
