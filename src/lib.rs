//! red5wrapper starts, waits on, and stops a single Red5 media server for test
//! harnesses and deploy scripts. A pid file keyed by the installation path lets
//! separate invocations detect a live instance, clean up after a dead one, and
//! stop a server they did not start themselves.

/// CLI interface.
pub mod cli;

/// Configuration management.
pub mod config;

/// Defaults, file names and timing values.
pub mod constants;

/// Error handling.
pub mod error;

/// Child log file access.
pub mod logs;

/// Pid file persistence.
pub mod pid;

/// Port, health and liveness probes.
pub mod probe;

/// Launching and terminating the server process.
pub mod process;

/// Start/stop protocol.
pub mod supervisor;

pub mod test_utils;

pub use config::{TargetConfig, TargetParams};
pub use error::{PidFileError, WrapperError};
pub use supervisor::{Readiness, Supervisor};
