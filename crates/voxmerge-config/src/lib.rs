//! Configuration for the voxmerge tool.
//!
//! Settings persist to disk as `config.ron` and can be overridden per run
//! from the command line.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{APP_NAME, Config, DebugConfig, MergeConfig, default_config_dir, resolve_config_dir};
pub use error::ConfigError;
