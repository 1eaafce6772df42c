
use anyhow::bail;
use chrono::Datelike;
use clap::Parser;
use lazy_static::lazy_static;
use std::path::Path;

use crate::cli::generate::GenerateSettings;

lazy_static! {
    /// Stores the full version string we plan to use, which is generated in build.rs
    /// # Examples
    /// * `0.1.0-6bb9635-dirty` - while on a dirty branch
    /// * `0.1.0-6bb9635` - with a fresh commit
    pub static ref FULL_VERSION: String = format!("{}-{}", env!("CARGO_PKG_VERSION"), env!("VERGEN_GIT_DESCRIBE"));

    /// Shared after help string containing the legalese.
    pub static ref AFTER_HELP: String = format!("Copyright (C) {}     the gtmerge developers.
This program comes with ABSOLUTELY NO WARRANTY; it is intended for
Research Use Only and not for use in diagnostic procedures.", chrono::Utc::now().year());
}

pub fn get_cli() -> GenerateSettings {
    GenerateSettings::parse()
}

/// Checks if a file exists and will otherwise error
/// # Arguments
/// * `filename` - the file path to check for
/// * `label` - the label to use for error messages
pub fn check_required_filename(filename: &Path, label: &str) -> anyhow::Result<()> {
    if !filename.exists() {
        bail!("{} does not exist: \"{}\"", label, filename.display());
    }

    // file exists
    Ok(())
}
