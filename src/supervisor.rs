//! Start/stop protocol for a single Red5 installation.
//!
//! The pid file is the durable record of "started from here"; the in-memory
//! process handle only lives as long as this [`Supervisor`] and is dropped on
//! every [`Supervisor::configure`].
use std::{
    env,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use tracing::{debug, error, info, warn};

use crate::{
    config::TargetConfig,
    constants::{APP_ROOT_ENV_VAR, HOME_ENV_VAR, LOG_FILE_NAME},
    error::WrapperError,
    pid::PidStore,
    probe,
    process::{self, ChildLauncher, Launcher, ProcessHandle},
};

/// Outcome of waiting for the server after launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Port open and health check answered 200.
    Ready,
    /// The startup wait elapsed first. The server may still come up.
    TimedOut,
    /// The wait was interrupted through the cancel flag.
    Cancelled,
}

/// Owns the configuration, pid store and process handle for one target.
pub struct Supervisor {
    base_path: PathBuf,
    log_dir: PathBuf,
    launcher: Box<dyn Launcher>,
    config: Option<TargetConfig>,
    pid_store: Option<PidStore>,
    process: Option<Box<dyn ProcessHandle>>,
    cancel: Arc<AtomicBool>,
}

impl Supervisor {
    /// Creates a supervisor that launches real processes, keeping pid files
    /// under `<base_path>/tmp/pids`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self::with_launcher(base_path, ChildLauncher)
    }

    /// Creates a supervisor rooted at `$APP_ROOT`, or the current directory.
    pub fn from_env() -> Self {
        let base = env::var_os(APP_ROOT_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(base)
    }

    /// Creates a supervisor with a custom launcher.
    pub fn with_launcher(base_path: impl Into<PathBuf>, launcher: impl Launcher + 'static) -> Self {
        let log_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        debug!("Initializing red5wrapper");
        Self {
            base_path: base_path.into(),
            log_dir,
            launcher: Box::new(launcher),
            config: None,
            pid_store: None,
            process: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Overrides the directory receiving `red5wrapper.log` in quiet mode.
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Location of the child log file in quiet mode.
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }

    /// The active configuration, if any.
    pub fn config(&self) -> Option<&TargetConfig> {
        self.config.as_ref()
    }

    /// Flag that interrupts a running readiness wait when set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Applies `config`, drops any owned process handle and exports
    /// `RED5_HOME` for the launcher.
    pub fn configure(&mut self, config: TargetConfig) -> Result<&mut Self, WrapperError> {
        if config.red5_home.as_os_str().is_empty() {
            return Err(WrapperError::Configuration(
                "red5_home must not be empty".into(),
            ));
        }

        self.reset_process();

        unsafe {
            env::set_var(HOME_ENV_VAR, &config.red5_home);
        }

        // Resolved once so a later change of working directory cannot move it.
        self.pid_store = Some(PidStore::new(&self.base_path, &config.red5_home));
        debug!(
            "Configured red5 at {} on port {}",
            config.red5_home.display(),
            config.port
        );
        self.config = Some(config);
        Ok(self)
    }

    /// Forgets the owned process handle so the next start builds a fresh one.
    pub fn reset_process(&mut self) {
        self.process = None;
    }

    fn require_config(&self) -> Result<(&TargetConfig, &PidStore), WrapperError> {
        match (&self.config, &self.pid_store) {
            (Some(config), Some(store)) => Ok((config, store)),
            _ => Err(WrapperError::Configuration(
                "supervisor used before configure()".into(),
            )),
        }
    }

    /// The pid store for the configured installation.
    pub fn pid_store(&self) -> Result<&PidStore, WrapperError> {
        self.require_config().map(|(_, store)| store)
    }

    /// The recorded pid, or `None` when nothing was started from here.
    pub fn pid(&self) -> Option<u32> {
        let store = self.pid_store.as_ref()?;
        match store.read() {
            Ok(pid) => pid,
            Err(err) => {
                warn!("Ignoring unreadable pid file {}: {err}", store.path().display());
                None
            }
        }
    }

    fn process(&mut self) -> Result<&mut dyn ProcessHandle, WrapperError> {
        let Some(config) = self.config.as_ref() else {
            return Err(WrapperError::Configuration(
                "supervisor used before configure()".into(),
            ));
        };
        let handle = self
            .process
            .get_or_insert_with(|| self.launcher.build(config, &self.log_dir));
        Ok(handle.as_mut())
    }

    /// Launches the server unless a live instance is already recorded, records
    /// its pid, then waits for readiness.
    ///
    /// Failing to observe readiness within the startup wait is not an error.
    pub fn start(&mut self) -> Result<Readiness, WrapperError> {
        let (config, store) = self.require_config()?;
        let (config, store) = (config.clone(), store.clone());

        debug!("Starting red5 with these values: ");
        debug!("red5_home: {}", config.red5_home.display());
        debug!("red5_command: {}", config.launcher_path().display());

        match store.read() {
            Ok(Some(pid)) if probe::is_pid_running(pid) => {
                return Err(WrapperError::AlreadyRunning { pid });
            }
            Ok(Some(pid)) => {
                warn!(
                    "Removing stale PID file at {} (PID {pid} is not running)",
                    store.path().display()
                );
                store.remove();
            }
            Ok(None) => {}
            Err(err) => {
                warn!("Removing unreadable PID file: {err}");
                store.remove();
            }
        }

        if probe::is_port_in_use(config.port) {
            return Err(WrapperError::PortConflict { port: config.port });
        }

        self.cancel.store(false, Ordering::SeqCst);
        let pid = self.process()?.start()?;

        if let Err(err) = store.write(pid) {
            error!("Could not record PID {pid}; stopping the launched process");
            if let Some(mut handle) = self.process.take()
                && let Err(stop_err) = handle.stop()
            {
                warn!("Failed to stop PID {pid} after pid file error: {stop_err}");
            }
            return Err(err);
        }

        info!("Red5 started with PID {pid}");
        Ok(self.wait_for_startup())
    }

    /// Polls until the port is open and the health page answers 200, the
    /// startup wait elapses, or the cancel flag is raised.
    pub fn wait_for_startup(&self) -> Readiness {
        let Some(config) = self.config.as_ref() else {
            return Readiness::TimedOut;
        };
        let deadline = Instant::now() + config.startup_wait;

        loop {
            if self.cancel.load(Ordering::SeqCst) {
                warn!("Startup wait for port {} cancelled", config.port);
                return Readiness::Cancelled;
            }

            if probe::is_ready(config.port) {
                info!("Red5 is listening on port {}", config.port);
                return Readiness::Ready;
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "Waited {} seconds for red5 to start, but it is not yet listening on port {}. Continuing anyway.",
                    config.startup_wait.as_secs(),
                    config.port
                );
                return Readiness::TimedOut;
            }

            thread::sleep(config.poll_interval.min(deadline - now));
        }
    }

    /// Stops the recorded instance and removes its pid file.
    ///
    /// Signal and file errors are logged, never returned; the only error is
    /// calling this before [`Supervisor::configure`].
    pub fn stop(&mut self) -> Result<(), WrapperError> {
        let store = self.require_config()?.1.clone();

        let pid = match store.read() {
            Ok(pid) => pid,
            Err(err) => {
                warn!("Removing unreadable PID file: {err}");
                store.remove();
                None
            }
        };
        debug!("Instance stop method called for pid '{pid:?}'");

        let Some(pid) = pid else {
            self.reset_process();
            return Ok(());
        };

        match self.process.take() {
            Some(mut handle) if handle.pid() == Some(pid) => {
                if let Err(err) = handle.stop() {
                    warn!("Failed to stop PID {pid}: {err}");
                }
            }
            _ => {
                if let Err(err) = process::kill_pid(pid) {
                    warn!("Failed to kill PID {pid}: {err}");
                }
            }
        }

        store.remove();
        info!("Red5 stopped (PID {pid})");
        Ok(())
    }

    /// Configures for `config` and reports whether a pid is recorded.
    pub fn is_running(&mut self, config: TargetConfig) -> Result<bool, WrapperError> {
        Ok(self.configure(config)?.pid().is_some())
    }

    /// Configures for `config` and returns the recorded pid.
    pub fn pid_for(&mut self, config: TargetConfig) -> Result<Option<u32>, WrapperError> {
        Ok(self.configure(config)?.pid())
    }

    /// Starts the server, runs `task`, and always stops the server afterwards.
    pub fn wrap<T, E, F>(&mut self, config: TargetConfig, task: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<WrapperError>,
    {
        self.configure(config)?;

        let result = match self.start() {
            Ok(_) => task(self),
            Err(err) => {
                error!("Error starting red5: {err}");
                Err(err.into())
            }
        };

        if let Err(err) = self.stop() {
            warn!("Failed to stop red5 after task: {err}");
        }
        result
    }
}
