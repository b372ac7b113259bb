//! Error types for the counting pipeline

use std::path::PathBuf;

use presence_map::PresenceError;
use thiserror::Error;

/// Errors that can abort a counting run
#[derive(Debug, Error)]
pub enum UniqIpError {
    /// The input could not be opened
    #[error("Failed to open input {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input failed mid-stream and the read-error policy is `fail`
    #[error("Read error after {lines_read} lines: {source}")]
    Read {
        lines_read: u64,
        source: std::io::Error,
    },

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A configuration file could not be read
    #[error("Failed to read config file {}: {source}", .path.display())]
    ConfigFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A configuration file is not valid YAML for [`Config`](crate::Config)
    #[error("Failed to parse config file {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Error from the presence map
    #[error("Presence map error: {0}")]
    Presence(#[from] PresenceError),

    /// A pipeline thread could not be started
    #[error("Failed to spawn pipeline thread: {0}")]
    Spawn(std::io::Error),

    /// A pipeline thread panicked
    #[error("Pipeline thread {0} panicked")]
    WorkerPanicked(String),
}

/// A specialized Result type for counting operations
pub type Result<T> = std::result::Result<T, UniqIpError>;
