//! Error handling for red5wrapper.
use std::path::PathBuf;

use thiserror::Error;

/// Defines all errors the supervisor can surface to its caller.
#[derive(Debug, Error)]
pub enum WrapperError {
    /// The target configuration is missing required values or is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A live process is already recorded for this installation.
    #[error("Server is already running with PID {pid}")]
    AlreadyRunning {
        /// The pid found in the pid file.
        pid: u32,
    },

    /// Something other than a recorded instance holds the target port.
    #[error("Port {port} is already in use.")]
    PortConflict {
        /// The configured listen port.
        port: u16,
    },

    /// The pid file could not be written to either the primary or fallback location.
    #[error("Failed to write PID file {}: {source}", path.display())]
    FileSystem {
        /// The last location that was attempted.
        path: PathBuf,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The launcher could not be spawned.
    #[error("Failed to start '{command}': {source}")]
    ProcessStart {
        /// The command that was being launched.
        command: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The launched process could not be signalled.
    #[error("Failed to stop process {pid}: {source}")]
    ProcessStop {
        /// The pid that was being terminated.
        pid: u32,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    ConfigParse(#[from] serde_yaml::Error),
}

/// Error type for pid file operations.
#[derive(Debug, Error)]
pub enum PidFileError {
    /// Error reading or deleting a pid file.
    #[error("Failed to access PID file: {0}")]
    Io(#[from] std::io::Error),

    /// The pid file exists but does not hold a process id.
    #[error("PID file {} does not contain a valid pid: {contents:?}", path.display())]
    Parse {
        /// Location of the malformed file.
        path: PathBuf,
        /// What was found inside it.
        contents: String,
    },
}
