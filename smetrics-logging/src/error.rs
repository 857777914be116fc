use std::path::PathBuf;
use std::{io, mem};

use thiserror::Error;

/// The result type of the logging bootstrap.
pub type Result<T> = std::result::Result<T, LoggingError>;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("a logger has already been initialized for this process")]
    AlreadyInitialized,
    #[error("failed to load log config {0}, {1}")]
    ConfigFile(PathBuf, String),
    #[error("invalid logger configuration, {0}")]
    Config(String),
    #[error("failed to prepare the log file, {0}")]
    Io(#[from] io::Error),
}

impl PartialEq for LoggingError {
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}
