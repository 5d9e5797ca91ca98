//! List command: one block per workspace root with its notes.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::sync::NotepadSynchronizer;

use super::build_synchronizer;

fn workspace_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

/// Render the index like the notepad tree: roots, then their notes by name.
pub fn render(sync: &NotepadSynchronizer, out: &mut impl Write) -> std::io::Result<()> {
    for root in sync.workspace_roots() {
        writeln!(out, "{} ({})", workspace_name(&root), root.display())?;

        let mut notes = sync.notes(&root);
        notes.sort_by(|a, b| a.name.cmp(&b.name));
        if notes.is_empty() {
            writeln!(out, "  (no notes)")?;
        }
        for note in notes {
            writeln!(out, "  {}", note.name)?;
        }
    }
    Ok(())
}

/// Run list command.
pub async fn run_list(settings: &Settings, roots: Vec<PathBuf>) -> anyhow::Result<()> {
    let (sync, _workspaces) = build_synchronizer(settings, roots)?;
    sync.setup().await;
    sync.wait_refreshed().await;

    let stdout = std::io::stdout();
    render(&sync, &mut stdout.lock())?;

    sync.shutdown();
    Ok(())
}
