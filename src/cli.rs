//! Command-line interface for red5wrapper.
use std::{path::PathBuf, str::FromStr};

use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::config::TargetParams;

/// Wrapper around `LevelFilter` so clap can parse log levels from either
/// string names ("info", "debug", etc.) or numeric shorthands (0-5).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        if let Ok(number) = trimmed.parse::<u8>() {
            let level = match number {
                0 => LevelFilter::OFF,
                1 => LevelFilter::ERROR,
                2 => LevelFilter::WARN,
                3 => LevelFilter::INFO,
                4 => LevelFilter::DEBUG,
                5 => LevelFilter::TRACE,
                _ => {
                    return Err(format!(
                        "unsupported log level number '{number}' (expected 0-5)"
                    ));
                }
            };

            return Ok(LogLevelArg(level));
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" | "information" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for red5wrapper.
#[derive(Parser)]
#[command(name = "red5w", version, author)]
#[command(about = "Start, wait on, and stop a Red5 server", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Selects which Red5 installation a command applies to.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Application root holding `config/red5.yml` and `tmp/pids` (defaults to $APP_ROOT or `.`).
    #[arg(long, value_name = "DIR")]
    pub app_root: Option<PathBuf>,

    /// Configuration section to use (defaults to $environment, then `default`).
    #[arg(short, long, value_name = "NAME")]
    pub environment: Option<String>,

    /// Red5 installation directory.
    #[arg(long = "home", value_name = "DIR")]
    pub red5_home: Option<String>,

    /// Port Red5 listens on.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Seconds to wait for Red5 to answer after launching.
    #[arg(long, value_name = "SECONDS")]
    pub startup_wait: Option<u64>,

    /// Show Red5 output in this terminal instead of red5wrapper.log.
    #[arg(short, long)]
    pub verbose: bool,
}

impl TargetArgs {
    /// Values given on the command line, as overrides for the config file.
    pub fn overrides(&self) -> TargetParams {
        TargetParams {
            red5_home: self.red5_home.clone(),
            red5_port: self.port,
            startup_wait: self.startup_wait,
            quiet: self.verbose.then_some(false),
            ..TargetParams::default()
        }
    }
}

/// Available commands for red5w.
#[derive(Subcommand)]
pub enum Commands {
    /// Start Red5 and wait until it answers.
    Start {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Stop the Red5 recorded in the pid file.
    Stop {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Report whether Red5 is running.
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Print the recorded pid.
    Pid {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Show the tail of red5wrapper.log.
    Logs {
        /// Number of lines to show.
        #[arg(short, long, default_value = "50")]
        lines: usize,
    },

    /// Start Red5, run a command against it, then stop Red5.
    Wrap {
        #[command(flatten)]
        target: TargetArgs,

        /// Command and arguments to execute.
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
