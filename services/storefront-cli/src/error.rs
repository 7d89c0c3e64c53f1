//! CLI error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}\n\n{usage}", usage = crate::commands::USAGE)]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
