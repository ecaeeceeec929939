//! Filesystem port registry: maps a pid to the port its agent listens on.
//!
//! One file per active agent, named by pid, containing the decimal port as
//! text. Both sides use it: the agent publishes at startup, the diagnoser
//! looks records up to resolve a pid into an endpoint.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Environment override for the registry directory.
pub const CONFIG_DIR_ENV: &str = "PIDTOP_CONFIG_DIR";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No record for that pid: it never ran an agent, or the record was
    /// cleaned up. Distinct from an I/O failure reading one.
    #[error("no agent record for pid {0}")]
    NotFound(u32),
    #[error("agent record for pid {pid} is malformed: {content:?}")]
    Malformed { pid: u32, content: String },
    #[error("registry unreadable: {0}")]
    Io(#[from] io::Error),
    #[error("unable to locate a per-user config directory")]
    NoConfigDir,
}

/// Registry directory: `$PIDTOP_CONFIG_DIR` if set, else the OS-convention
/// per-user config dir (e.g. `~/.config/pidtop`).
pub fn config_dir() -> Result<PathBuf, RegistryError> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    dirs_next::config_dir()
        .map(|d| d.join("pidtop"))
        .ok_or(RegistryError::NoConfigDir)
}

fn record_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(pid.to_string())
}

/// Publish the port for `pid`, overwriting any stale record. The write goes
/// through a temp file and a rename so a concurrent reader never observes a
/// partial value.
pub fn publish(dir: &Path, pid: u32, port: u16) -> Result<PathBuf, RegistryError> {
    let path = record_path(dir, pid);
    let tmp = dir.join(format!("{pid}.tmp"));
    fs::write(&tmp, port.to_string())?;
    fs::rename(&tmp, &path)?;
    Ok(path)
}

/// Read the port recorded for `pid`.
pub fn lookup(dir: &Path, pid: u32) -> Result<u16, RegistryError> {
    let path = record_path(dir, pid);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(RegistryError::NotFound(pid));
        }
        Err(e) => return Err(RegistryError::Io(e)),
    };
    content
        .trim()
        .parse::<u16>()
        .map_err(|_| RegistryError::Malformed { pid, content })
}

/// Delete the record for `pid`. Already-absent records are fine.
pub fn remove(dir: &Path, pid: u32) -> Result<(), RegistryError> {
    match fs::remove_file(record_path(dir, pid)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RegistryError::Io(e)),
    }
}

/// All pids with a record in `dir`. Non-numeric file names (editor swap
/// files, leftover temp files) are skipped.
pub fn list(dir: &Path) -> Result<Vec<u32>, RegistryError> {
    let mut pids = Vec::new();
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(pids),
        Err(e) => return Err(RegistryError::Io(e)),
    };
    for entry in entries {
        let entry = entry?;
        if let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
            pids.push(pid);
        }
    }
    pids.sort_unstable();
    Ok(pids)
}
