//! Watch command: run the synchronizer and report note changes.

use std::path::PathBuf;

use crate::config::Settings;
use crate::sync::NoteChange;

use super::build_synchronizer;

/// Run watch command until Ctrl-C.
pub async fn run_watch(settings: &Settings, roots: Vec<PathBuf>) -> anyhow::Result<()> {
    let (sync, _workspaces) = build_synchronizer(settings, roots)?;
    let (_subscription, mut changes) = sync.note_changes();

    let dispatch = sync.start()?;
    sync.setup().await;
    sync.wait_refreshed().await;

    for root in sync.workspace_roots() {
        crate::log_event!(
            "watch",
            "tracking",
            "{} ({} notes)",
            root.display(),
            sync.notes_in_workspace(&root).len()
        );
    }
    println!("Watching {} workspace(s). Press Ctrl-C to stop.", sync.workspace_roots().len());

    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                let verb = match change.change {
                    NoteChange::Updated => "updated",
                    NoteChange::Removed => "removed",
                };
                println!("{verb}: {}", change.note_path.display());
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::error!("[watch] cannot listen for Ctrl-C: {e}");
                }
                break;
            }
        }
    }

    sync.shutdown();
    let _ = dispatch.await;
    crate::log_event!("watch", "stopped");
    Ok(())
}
