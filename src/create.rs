//! Creating new note files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use thiserror::Error;

use crate::config::NotepadConfig;

#[derive(Error, Debug)]
pub enum CreateNoteError {
    #[error("Workspace root {0} does not exist")]
    MissingWorkspace(PathBuf),

    #[error("Invalid date prefix format '{0}'")]
    InvalidPrefixFormat(String),

    #[error("Failed to create note {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

const INVALID_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn sanitize_title(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| {
            if INVALID_FILENAME_CHARS.contains(&c) || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect()
}

/// File name for a new note: `"{date prefix} {title}{extension}"`, or
/// `"{date prefix}{extension}"` when the title is blank.
pub fn note_file_name<Tz>(
    title: &str,
    config: &NotepadConfig,
    now: &DateTime<Tz>,
) -> Result<String, CreateNoteError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    use std::fmt::Write;

    // chrono reports bad format strings as a fmt::Error while rendering
    let mut prefix = String::new();
    write!(prefix, "{}", now.format(&config.prefix_format))
        .map_err(|_| CreateNoteError::InvalidPrefixFormat(config.prefix_format.clone()))?;

    let title = sanitize_title(title);
    let extension = config.extension();

    Ok(match (prefix.is_empty(), title.is_empty()) {
        (_, true) => format!("{prefix}{extension}"),
        (true, false) => format!("{title}{extension}"),
        (false, false) => format!("{prefix} {title}{extension}"),
    })
}

/// Create an empty note in `root`'s notepad folder and return its path.
///
/// The notepad folder is created if missing. An existing note with the same
/// name is left untouched.
pub async fn create_note<Tz>(
    root: &Path,
    title: &str,
    config: &NotepadConfig,
    now: &DateTime<Tz>,
) -> Result<PathBuf, CreateNoteError>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    if !tokio::fs::try_exists(root).await.unwrap_or(false) {
        return Err(CreateNoteError::MissingWorkspace(root.to_path_buf()));
    }

    let folder = root.join(&config.folder_name);
    tokio::fs::create_dir_all(&folder)
        .await
        .map_err(|source| CreateNoteError::Io {
            path: folder.clone(),
            source,
        })?;

    let path = folder.join(note_file_name(title, config, now)?);

    let created = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .await;

    match created {
        Ok(_) => crate::log_event!("create", "note created", "{}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            crate::debug_event!("create", "note exists", "{}", path.display());
        }
        Err(source) => {
            return Err(CreateNoteError::Io {
                path: path.clone(),
                source,
            });
        }
    }

    Ok(path)
}
