//! Constants and default values for red5wrapper.
//!
//! Anything that names a file, a path segment, or a timing default lives here so
//! the supervisor, the CLI, and the tests agree on the same values.

use std::time::Duration;

// ============================================================================
// Target Defaults
// ============================================================================

/// Port Red5 listens on when the configuration does not say otherwise.
pub const DEFAULT_PORT: u16 = 5080;

/// How long `start` waits for readiness before giving up with a warning.
pub const DEFAULT_STARTUP_WAIT: Duration = Duration::from_secs(5);

/// Delay between readiness checks while waiting for startup.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Child output is redirected to a log file unless configured otherwise.
pub const DEFAULT_QUIET: bool = true;

// ============================================================================
// Launch Contract
// ============================================================================

/// Launcher script located inside the installation directory.
pub const LAUNCHER_SCRIPT: &str = "red5.sh";

/// Environment variable the launcher uses to locate its installation.
pub const HOME_ENV_VAR: &str = "RED5_HOME";

/// Environment variable carrying the configured launch options to the JVM.
pub const JAVA_OPTS_ENV_VAR: &str = "JAVA_OPTS";

/// Directory name appended to the application root when no `red5_home` is set.
pub const DEFAULT_INSTALL_DIR: &str = "red5";

// ============================================================================
// File System Layout
// ============================================================================

/// Directory, relative to the base path, where pid files are written.
pub const PID_DIR: &str = "tmp/pids";

/// Directory, relative to the base path, used when `PID_DIR` is not writable.
pub const PID_FALLBACK_DIR: &str = "tmp";

/// Extension appended to the sanitized installation path.
pub const PID_EXTENSION: &str = ".pid";

/// Character substituted for path separators in pid file names.
pub const PID_PATH_FILLER: char = '_';

/// Log file receiving child stdout/stderr in quiet mode.
pub const LOG_FILE_NAME: &str = "red5wrapper.log";

/// Configuration file looked up under the application root.
pub const CONFIG_FILE: &str = "config/red5.yml";

/// Section used when the requested environment is missing from the config.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Environment variable naming the application root.
pub const APP_ROOT_ENV_VAR: &str = "APP_ROOT";

/// Environment variable selecting the configuration section.
pub const ENVIRONMENT_ENV_VAR: &str = "environment";

// ============================================================================
// Probes
// ============================================================================

/// Connect and request timeout for port and health probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Path requested by the HTTP health probe.
pub const HEALTH_PATH: &str = "login.html";

// ============================================================================
// Process Termination
// ============================================================================

/// Number of liveness checks after SIGTERM before escalating to SIGKILL.
pub const TERMINATE_CHECKS: usize = 10;

/// Interval between post-SIGTERM liveness checks.
pub const TERMINATE_CHECK_INTERVAL: Duration = Duration::from_millis(100);
