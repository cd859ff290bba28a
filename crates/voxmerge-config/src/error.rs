//! Errors raised while locating, reading, or writing `config.ron`.

/// Configuration failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No `--config` was given and the OS exposes no config directory.
    #[error("could not determine a config directory; pass --config")]
    NoConfigDir,

    /// Reading `config.ron` failed.
    #[error("failed to read config: {0}")]
    ReadError(#[source] std::io::Error),

    /// Creating the config directory or writing `config.ron` failed.
    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    /// `config.ron` is not valid RON for [`Config`](crate::Config).
    #[error("failed to parse config: {0}")]
    ParseError(#[source] ron::error::SpannedError),

    /// The config could not be rendered as RON.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[source] ron::Error),
}
