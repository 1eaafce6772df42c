
use clap::Parser;
use log::info;
use std::path::PathBuf;

use crate::cli::core::{check_required_filename, AFTER_HELP, FULL_VERSION};

/// gtmerge, a tool for combining archaic and modern genotypes into one matrix.
/// The output feeds IBD-based introgression detection.
#[derive(Parser, Clone, Default)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = &**AFTER_HELP
)]
pub struct GenerateSettings {
    #[clap(default_value = "")]
    #[clap(hide = true)]
    gtmerge_version: String,

    /// Input archaic VCF; may contain multiple archaic samples but only the first is used. Plain text or gzip.
    #[clap(required = true)]
    #[clap(short = 'a')]
    #[clap(long = "archaic")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub archaic_fn: PathBuf,

    /// Input modern VCF with one genotype column per population sample. Plain text or gzip.
    #[clap(required = true)]
    #[clap(short = 'm')]
    #[clap(long = "modern")]
    #[clap(value_name = "VCF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub modern_fn: PathBuf,

    /// Folder the genotype matrix gets written into
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    #[clap(default_value = ".")]
    pub output_dir: PathBuf,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

pub fn check_generate_settings(mut settings: GenerateSettings) -> anyhow::Result<GenerateSettings> {
    // hard code the version in
    settings.gtmerge_version = FULL_VERSION.clone();
    info!("gtmerge version: {:?}", &settings.gtmerge_version);
    info!("Inputs:");

    // check for all the required input files
    check_required_filename(&settings.archaic_fn, "Archaic VCF")?;
    info!("\tArchaic VCF: {:?}", &settings.archaic_fn);
    check_required_filename(&settings.modern_fn, "Modern VCF")?;
    info!("\tModern VCF: {:?}", &settings.modern_fn);

    // outputs
    info!("Outputs:");
    info!("\tOutput folder: {:?}", &settings.output_dir);

    Ok(settings)
}
