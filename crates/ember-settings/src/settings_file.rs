//! Settings file utilities

use anyhow::{Context, Result};
use std::path::PathBuf;

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .context("Could not determine config directory")
        .map(|p| p.join("ember"))
}

pub fn config_file() -> Result<PathBuf> {
    config_dir().map(|p| p.join("config.json"))
}
