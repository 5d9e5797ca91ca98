//! CLI argument parsing using clap.
//!
//! Contains the Cli struct and the Commands enum.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Per-workspace notepads kept in sync with disk
#[derive(Parser, Debug)]
#[command(
    name = "notepad",
    version = env!("CARGO_PKG_VERSION"),
    about = "Per-workspace notepads kept in sync with disk",
    long_about = "Track a notepad folder in every workspace root and list, create and watch its notes.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace root to track (repeatable; defaults to config, then the current directory)
    #[arg(short, long = "root", value_name = "DIR", global = true)]
    pub roots: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize project
    #[command(about = "Set up .notepad/settings.toml with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Show current configuration settings
    #[command(about = "Display active settings")]
    Config,

    /// List every workspace root and its notes
    #[command(about = "List notes per workspace")]
    List,

    /// Create a new note
    #[command(
        about = "Create a note named after today's date and a title",
        after_help = "Examples:\n  notepad new Groceries\n  notepad new \"Sprint plan\" --workspace ~/work/api\n  notepad new"
    )]
    New {
        /// Note title (optional)
        #[arg(value_name = "TITLE", num_args = 0..)]
        title: Vec<String>,

        /// Workspace root to create the note in (defaults to the first root)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },

    /// Watch notepad folders and report changes until interrupted
    #[command(about = "Watch notepads and log note changes")]
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_new_with_roots() {
        let cli = Cli::parse_from([
            "notepad", "--root", "/a", "-r", "/b", "new", "Sprint", "plan", "-w", "/b",
        ]);
        assert_eq!(cli.roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        match cli.command {
            Commands::New { title, workspace } => {
                assert_eq!(title.join(" "), "Sprint plan");
                assert_eq!(workspace, Some(PathBuf::from("/b")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
