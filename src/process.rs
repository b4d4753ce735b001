//! Launching and terminating the Red5 child process.
//!
//! The supervisor only talks to [`ProcessHandle`]s built by a [`Launcher`], so
//! tests can swap in a launcher that never touches a real process.
use std::{
    fs::File,
    io,
    os::unix::process::CommandExt,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
    thread,
};

use nix::{
    errno::Errno,
    sys::signal::{self, Signal},
    unistd::Pid,
};
use tracing::{debug, error, info, warn};

use crate::{
    config::TargetConfig,
    constants::{
        HOME_ENV_VAR, JAVA_OPTS_ENV_VAR, LOG_FILE_NAME, TERMINATE_CHECK_INTERVAL,
        TERMINATE_CHECKS,
    },
    error::WrapperError,
};

/// A single launchable server process.
pub trait ProcessHandle: Send {
    /// Launches the process and returns its pid.
    fn start(&mut self) -> Result<u32, WrapperError>;

    /// The pid assigned by the OS, once started.
    fn pid(&self) -> Option<u32>;

    /// Requests termination. Does not guarantee the process has exited.
    fn stop(&mut self) -> Result<(), WrapperError>;
}

/// Builds fresh process handles for a configuration.
pub trait Launcher: Send {
    fn build(&self, config: &TargetConfig, log_dir: &Path) -> Box<dyn ProcessHandle>;
}

/// Where child stdout/stderr end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Shares the supervisor's own standard streams.
    Inherit,
    /// Both streams appended to one log file.
    LogFile(PathBuf),
}

/// Launches `red5.sh` as a real, detached OS process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChildLauncher;

impl Launcher for ChildLauncher {
    fn build(&self, config: &TargetConfig, log_dir: &Path) -> Box<dyn ProcessHandle> {
        Box::new(ChildHandle::new(config, log_dir))
    }
}

/// Owns the spawned launcher process.
#[derive(Debug)]
pub struct ChildHandle {
    command: PathBuf,
    working_dir: PathBuf,
    output: OutputMode,
    env: Vec<(String, String)>,
    child: Option<Child>,
}

impl ChildHandle {
    pub fn new(config: &TargetConfig, log_dir: &Path) -> Self {
        let output = if config.quiet {
            OutputMode::LogFile(log_dir.join(LOG_FILE_NAME))
        } else {
            OutputMode::Inherit
        };

        let mut env = vec![(
            HOME_ENV_VAR.to_string(),
            config.red5_home.to_string_lossy().into_owned(),
        )];
        if !config.java_opts.is_empty() {
            env.push((JAVA_OPTS_ENV_VAR.to_string(), config.java_opts.join(" ")));
        }

        Self {
            command: config.launcher_path(),
            working_dir: config.red5_home.clone(),
            output,
            env,
            child: None,
        }
    }

    /// The launcher command line.
    pub fn command(&self) -> &Path {
        &self.command
    }

    pub fn output(&self) -> &OutputMode {
        &self.output
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn build_command(&self) -> io::Result<Command> {
        let mut cmd = Command::new(&self.command);
        cmd.current_dir(&self.working_dir);
        cmd.stdin(Stdio::null());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        match &self.output {
            OutputMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
            OutputMode::LogFile(path) => {
                let log = File::create(path)?;
                cmd.stdout(Stdio::from(log.try_clone()?));
                cmd.stderr(Stdio::from(log));
                warn!("Logging red5wrapper stdout to {}", path.display());
            }
        }

        unsafe {
            cmd.pre_exec(|| {
                // New session so the server outlives the wrapper and can be
                // signalled as a group.
                if libc::setsid() < 0 {
                    let err = io::Error::last_os_error();
                    eprintln!("red5wrapper pre_exec: setsid failed: {:?}", err);
                    return Err(err);
                }
                Ok(())
            });
        }

        Ok(cmd)
    }

    fn start_error(&self, source: io::Error) -> WrapperError {
        WrapperError::ProcessStart {
            command: self.command.display().to_string(),
            source,
        }
    }
}

impl ProcessHandle for ChildHandle {
    fn start(&mut self) -> Result<u32, WrapperError> {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => {
                    debug!("Process {} already started", child.id());
                    return Ok(child.id());
                }
                _ => self.child = None,
            }
        }

        let mut cmd = self.build_command().map_err(|err| self.start_error(err))?;
        debug!("Executing command: {cmd:?}");

        match cmd.spawn() {
            Ok(child) => {
                let pid = child.id();
                debug!("Launched {} with PID {pid}", self.command.display());
                self.child = Some(child);
                Ok(pid)
            }
            Err(err) => {
                error!("Failed to start {}: {err}", self.command.display());
                Err(self.start_error(err))
            }
        }
    }

    fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    fn stop(&mut self) -> Result<(), WrapperError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let pid = child.id();

        if let Ok(Some(status)) = child.try_wait() {
            debug!("Process {pid} already exited with {status}");
            return Ok(());
        }

        match signal_group(pid, Signal::SIGTERM) {
            Ok(()) => {
                for _ in 0..TERMINATE_CHECKS {
                    thread::sleep(TERMINATE_CHECK_INTERVAL);
                    if let Ok(Some(status)) = child.try_wait() {
                        info!("Process {pid} exited with {status}");
                        return Ok(());
                    }
                }
                warn!("Process {pid} did not exit after SIGTERM; sending SIGKILL");
            }
            Err(err) => warn!("SIGTERM to process {pid} failed ({err}); sending SIGKILL"),
        }

        if let Err(err) = signal_group(pid, Signal::SIGKILL) {
            warn!("SIGKILL to process group {pid} failed ({err}); killing the child directly");
            if let Err(kill_err) = child.kill() {
                warn!("Failed to kill process {pid}: {kill_err}");
                return Err(err);
            }
        }
        if let Err(err) = child.wait() {
            warn!("Failed to reap process {pid}: {err}");
        }
        Ok(())
    }
}

fn nix_error_to_io(err: Errno) -> io::Error {
    io::Error::from_raw_os_error(err as i32)
}

/// Signals the process group led by `pid`, falling back to the process itself.
fn signal_group(pid: u32, sig: Signal) -> Result<(), WrapperError> {
    let target = Pid::from_raw(pid as i32);

    match signal::killpg(target, sig) {
        Ok(()) | Err(Errno::ESRCH) => return Ok(()),
        Err(err) => {
            warn!(
                "Failed to signal process group {pid} with {sig:?} ({err}). Falling back to direct signal"
            );
        }
    }

    match signal::kill(target, sig) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(err) => Err(WrapperError::ProcessStop {
            pid,
            source: nix_error_to_io(err),
        }),
    }
}

/// Sends SIGKILL to a pid this process does not own. A missing process is fine.
pub fn kill_pid(pid: u32) -> Result<(), WrapperError> {
    let target = Pid::from_raw(pid as i32);
    match signal::kill(target, Signal::SIGKILL) {
        Ok(()) => {
            debug!("Sent SIGKILL to PID {pid}");
            Ok(())
        }
        Err(Errno::ESRCH) => {
            debug!("PID {pid} already gone");
            Ok(())
        }
        Err(err) => Err(WrapperError::ProcessStop {
            pid,
            source: nix_error_to_io(err),
        }),
    }
}
