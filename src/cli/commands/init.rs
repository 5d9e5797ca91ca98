//! Init and Config commands.

use std::path::{Path, PathBuf};

use crate::config::Settings;

/// Run init command - create configuration file.
pub fn run_init(force: bool) -> anyhow::Result<()> {
    let path = init_in(Path::new(""), force)?;
    println!("Created configuration file at: {}", path.display());
    println!("Edit this file to customize your settings.");
    Ok(())
}

/// Run config command - display current configuration.
pub fn run_config(config: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

fn init_in(base: &Path, force: bool) -> anyhow::Result<PathBuf> {
    Settings::init_config_file(base, force).map_err(|e| anyhow::anyhow!("{e}"))
}
