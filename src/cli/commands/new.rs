//! New command: create a note in one of the workspace roots.

use std::path::PathBuf;

use anyhow::Context;

use crate::config::Settings;
use crate::create::create_note;

/// Run new command.
pub async fn run_new(
    settings: &Settings,
    roots: Vec<PathBuf>,
    title: &[String],
    workspace: Option<PathBuf>,
) -> anyhow::Result<()> {
    let root = match workspace {
        Some(root) => std::path::absolute(&root)
            .with_context(|| format!("cannot resolve workspace {}", root.display()))?,
        None => roots
            .into_iter()
            .next()
            .context("no workspace root to create the note in")?,
    };

    let title = title.join(" ");
    let path = create_note(&root, &title, &settings.notepad, &chrono::Local::now()).await?;
    println!("{}", path.display());
    Ok(())
}
