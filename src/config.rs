//! Configuration management for red5wrapper.
use regex::{Captures, Regex};
use serde::Deserialize;
use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};

use crate::{
    constants::{
        CONFIG_FILE, DEFAULT_ENVIRONMENT, DEFAULT_INSTALL_DIR, DEFAULT_POLL_INTERVAL,
        DEFAULT_PORT, DEFAULT_QUIET, DEFAULT_STARTUP_WAIT, LAUNCHER_SCRIPT,
    },
    error::WrapperError,
};

/// Config shipped with the crate, used when the application has none.
const BUNDLED_CONFIG: &str = include_str!("../config/red5.yml");

/// Raw, optional parameters as they appear in `red5.yml` or on the command line.
#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
pub struct TargetParams {
    /// Where Red5 is installed.
    pub red5_home: Option<String>,
    /// Port Red5 listens on.
    pub red5_port: Option<u16>,
    /// Seconds to wait for readiness after launching.
    pub startup_wait: Option<u64>,
    /// Milliseconds between readiness checks.
    pub poll_interval: Option<u64>,
    /// Redirect Red5 output to a log file instead of the terminal.
    pub quiet: Option<bool>,
    /// Options handed to the JVM through `JAVA_OPTS`.
    pub java_opts: Option<Vec<String>>,
}

impl TargetParams {
    /// Overlays every value set in `other` on top of `self`.
    pub fn merge(mut self, other: TargetParams) -> Self {
        if other.red5_home.is_some() {
            self.red5_home = other.red5_home;
        }
        if other.red5_port.is_some() {
            self.red5_port = other.red5_port;
        }
        if other.startup_wait.is_some() {
            self.startup_wait = other.startup_wait;
        }
        if other.poll_interval.is_some() {
            self.poll_interval = other.poll_interval;
        }
        if other.quiet.is_some() {
            self.quiet = other.quiet;
        }
        if other.java_opts.is_some() {
            self.java_opts = other.java_opts;
        }
        self
    }

    /// Applies defaults and produces a usable [`TargetConfig`].
    ///
    /// Without an explicit `red5_home`, the installation is assumed to live in
    /// `<app_root>/red5`; with neither, configuration fails.
    pub fn resolve(self, app_root: Option<&Path>) -> Result<TargetConfig, WrapperError> {
        let red5_home = match (self.red5_home, app_root) {
            (Some(home), _) if !home.trim().is_empty() => PathBuf::from(home),
            (_, Some(root)) => root.join(DEFAULT_INSTALL_DIR),
            _ => {
                return Err(WrapperError::Configuration(
                    "You must set APP_ROOT or pass red5_home so the wrapper knows where Red5 is"
                        .into(),
                ));
            }
        };

        let mut config = TargetConfig::new(red5_home);
        if let Some(port) = self.red5_port {
            config.port = port;
        }
        if let Some(secs) = self.startup_wait {
            config.startup_wait = Duration::from_secs(secs);
        }
        if let Some(millis) = self.poll_interval {
            config.poll_interval = Duration::from_millis(millis);
        }
        if let Some(quiet) = self.quiet {
            config.quiet = quiet;
        }
        if let Some(opts) = self.java_opts {
            config.java_opts = opts;
        }
        Ok(config)
    }
}

/// Fully resolved settings for one supervised Red5 installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// Installation directory; also the key for the pid file.
    pub red5_home: PathBuf,
    /// Port Red5 listens on.
    pub port: u16,
    /// Upper bound on the readiness wait after launching.
    pub startup_wait: Duration,
    /// Delay between readiness checks.
    pub poll_interval: Duration,
    /// Redirect output to the log file when true, inherit it otherwise.
    pub quiet: bool,
    /// Launch options exported to the launcher.
    pub java_opts: Vec<String>,
}

impl TargetConfig {
    /// A configuration for `red5_home` with every other value defaulted.
    pub fn new(red5_home: impl Into<PathBuf>) -> Self {
        Self {
            red5_home: red5_home.into(),
            port: DEFAULT_PORT,
            startup_wait: DEFAULT_STARTUP_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            quiet: DEFAULT_QUIET,
            java_opts: Vec::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_startup_wait(mut self, wait: Duration) -> Self {
        self.startup_wait = wait;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn with_java_opts(mut self, opts: Vec<String>) -> Self {
        self.java_opts = opts;
        self
    }

    /// Full path of the launcher script.
    pub fn launcher_path(&self) -> PathBuf {
        self.red5_home.join(LAUNCHER_SCRIPT)
    }
}

/// Expands `${VAR}` references from the process environment. YAML comments,
/// whole-line or trailing, are copied through untouched.
fn expand_env_vars(input: &str) -> Result<String, WrapperError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|err| WrapperError::Configuration(err.to_string()))?;

    let mut missing: Option<String> = None;
    let mut output = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        let (content, comment) = split_comment(line);
        let expanded = re.replace_all(content, |caps: &Captures| match env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => {
                missing.get_or_insert_with(|| caps[1].to_string());
                String::new()
            }
        });
        output.push_str(&expanded);
        output.push_str(comment);
    }

    if let Some(name) = missing {
        return Err(WrapperError::Configuration(format!(
            "Missing environment variable: {name}"
        )));
    }
    Ok(output)
}

/// Splits `line` before a `#` that starts a comment: at the line start or
/// after whitespace.
fn split_comment(line: &str) -> (&str, &str) {
    let mut previous: Option<char> = None;
    for (idx, ch) in line.char_indices() {
        if ch == '#' && previous.is_none_or(char::is_whitespace) {
            return line.split_at(idx);
        }
        previous = Some(ch);
    }
    (line, "")
}

/// Parses a `red5.yml` document and picks the section for `environment`,
/// falling back to `default`.
pub fn parse_config(
    content: &str,
    environment: Option<&str>,
) -> Result<TargetParams, WrapperError> {
    let expanded = expand_env_vars(content)?;
    let mut sections: HashMap<String, TargetParams> =
        serde_yaml::from_str(&expanded).map_err(WrapperError::ConfigParse)?;

    if let Some(name) = environment
        && let Some(params) = sections.remove(name)
    {
        debug!("Using red5 configuration section '{name}'");
        return Ok(params);
    }

    debug!("Using red5 configuration section '{DEFAULT_ENVIRONMENT}'");
    Ok(sections.remove(DEFAULT_ENVIRONMENT).unwrap_or_default())
}

/// Loads `<app_root>/config/red5.yml`, or the bundled copy when the application
/// has none.
pub fn load_config(
    app_root: &Path,
    environment: Option<&str>,
) -> Result<TargetParams, WrapperError> {
    let path = app_root.join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            warn!(
                "Didn't find expected red5wrapper config file at {} ({err}), using default file instead.",
                path.display()
            );
            BUNDLED_CONFIG.to_string()
        }
    };

    parse_config(&content, environment)
}
