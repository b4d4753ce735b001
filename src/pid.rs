//! Pid file persistence keyed by installation path.
//!
//! The pid file is the only state shared between separate invocations of the
//! wrapper, so its location must be a pure function of the base path and the
//! installation path.
use std::{
    fs,
    io::ErrorKind,
    path::{self, Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    constants::{PID_DIR, PID_EXTENSION, PID_FALLBACK_DIR, PID_PATH_FILLER},
    error::{PidFileError, WrapperError},
};

/// Turns an installation path into a legal file name.
///
/// `/usr/local/red5` becomes `_usr_local_red5.pid`.
pub fn pid_file_name(install_path: &Path) -> String {
    let mut name: String = install_path
        .to_string_lossy()
        .chars()
        .map(|c| {
            if c == '/' || path::is_separator(c) {
                PID_PATH_FILLER
            } else {
                c
            }
        })
        .collect();
    name.push_str(PID_EXTENSION);
    name
}

/// Absolute directory holding pid files for the given base path.
pub fn pid_dir(base_path: &Path) -> PathBuf {
    absolute_base(base_path).join(PID_DIR)
}

fn absolute_base(base_path: &Path) -> PathBuf {
    path::absolute(base_path).unwrap_or_else(|_| base_path.to_path_buf())
}

/// Reads, writes and removes the pid file for one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidStore {
    primary: PathBuf,
    fallback: PathBuf,
}

impl PidStore {
    /// Builds the store for `install_path` rooted at `base_path`.
    pub fn new(base_path: &Path, install_path: &Path) -> Self {
        let file_name = pid_file_name(install_path);
        let base = absolute_base(base_path);
        Self {
            primary: base.join(PID_DIR).join(&file_name),
            fallback: base.join(PID_FALLBACK_DIR).join(&file_name),
        }
    }

    /// The fully qualified primary pid file path.
    pub fn path(&self) -> &Path {
        &self.primary
    }

    /// Location used when the primary directory cannot be written.
    pub fn fallback_path(&self) -> &Path {
        &self.fallback
    }

    /// Persists `pid`, falling back to the alternate directory when the primary
    /// one cannot be created or written. Returns the path actually written.
    pub fn write(&self, pid: u32) -> Result<PathBuf, WrapperError> {
        let contents = format!("{pid}\n");

        match write_file(&self.primary, &contents) {
            Ok(()) => {
                debug!("Wrote pid file to {} with value {pid}", self.primary.display());
                Ok(self.primary.clone())
            }
            Err(err) => {
                warn!(
                    "Unable to write pid file at {} ({err}); falling back to {}",
                    self.primary.display(),
                    self.fallback.display()
                );
                write_file(&self.fallback, &contents).map_err(|source| {
                    WrapperError::FileSystem {
                        path: self.fallback.clone(),
                        source,
                    }
                })?;
                debug!("Wrote pid file to {} with value {pid}", self.fallback.display());
                Ok(self.fallback.clone())
            }
        }
    }

    /// Returns the recorded pid, or `None` when no pid file exists.
    pub fn read(&self) -> Result<Option<u32>, PidFileError> {
        let Some(path) = self.locate() else {
            return Ok(None);
        };

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match contents.trim().parse::<u32>() {
            Ok(pid) if pid > 0 && pid <= i32::MAX as u32 => Ok(Some(pid)),
            _ => Err(PidFileError::Parse {
                path: path.to_path_buf(),
                contents: contents.trim().to_string(),
            }),
        }
    }

    /// Deletes the pid file wherever it lives. Failures are logged and ignored.
    pub fn remove(&self) {
        for path in [&self.primary, &self.fallback] {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed pid file {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => {
                    warn!("Failed to remove pid file {}: {err}", path.display());
                }
            }
        }
    }

    /// Whether a pid file is present.
    pub fn exists(&self) -> bool {
        self.locate().is_some()
    }

    fn locate(&self) -> Option<&Path> {
        [&self.primary, &self.fallback]
            .into_iter()
            .find(|path| path.is_file())
            .map(PathBuf::as_path)
    }
}

fn write_file(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}
