use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::constants::LOG_FILE_NAME;

/// Path of the child log file inside `dir`.
pub fn resolve_log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}

/// Returns the last `lines` lines of the log at `path`.
///
/// A missing log file is not an error: Red5 may never have been started in
/// quiet mode from this directory.
pub fn tail(path: &Path, lines: usize) -> io::Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(Result::ok).collect();

    let start = all_lines.len().saturating_sub(lines);
    Ok(Some(all_lines[start..].to_vec()))
}

/// Writes the last `lines` lines of the log at `path` to `out`.
pub fn show_log(path: &Path, lines: usize, out: &mut impl Write) -> io::Result<()> {
    match tail(path, lines)? {
        Some(tail) => {
            for line in tail {
                writeln!(out, "{line}")?;
            }
        }
        None => warn!("Log file {} not found", path.display()),
    }
    Ok(())
}
