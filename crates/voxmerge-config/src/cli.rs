//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Merge the models of several MagicaVoxel files into one.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "voxmerge", about = "Merge MagicaVoxel .vox files")]
pub struct CliArgs {
    /// Main file; its scene, layers and palette are kept.
    pub filename: PathBuf,

    /// Files whose models are merged into the main file, in order.
    pub files: Vec<PathBuf>,

    /// Output path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep relocated colors inside their material band.
    #[arg(long)]
    pub preserve_categories: Option<bool>,

    /// Version written into the output header.
    #[arg(long)]
    pub format_version: Option<u32>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref output) = args.output {
            self.merge.output = output.clone();
        }
        if let Some(preserve) = args.preserve_categories {
            self.merge.preserve_material_category = preserve;
        }
        if let Some(version) = args.format_version {
            self.merge.format_version = version;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
