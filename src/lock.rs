//! Cross-process exclusion for the rotation transition, and the atomic
//! "current" symlink swap.
//!
//! The lock is a create-exclusive marker file beside the rotation target:
//! compare-and-swap on filesystem existence. It spans only the transition
//! window, never ordinary writes, and acquisition either succeeds or fails
//! immediately. There is no wait.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::filename::{LOCK_SUFFIX, SYMLINK_SUFFIX};
use crate::{Error, Result};

/// Exclusive claim on one rotation transition. The marker is removed on
/// every exit path, panics included.
#[derive(Debug)]
pub struct RotationLock {
    marker: PathBuf,
}

impl RotationLock {
    /// Claim the transition for `target`. An existing marker means another
    /// process is mid-rotation; the caller falls back to its previous file
    /// instead of retrying.
    pub fn acquire(target: &Path) -> Result<Self> {
        let marker = suffixed(target, LOCK_SUFFIX);
        match OpenOptions::new().write(true).create_new(true).open(&marker) {
            Ok(_) => Ok(Self { marker }),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Err(Error::RotationInProgress)
            }
            Err(err) => Err(Error::Io(err)),
        }
    }

    #[cfg(test)]
    pub(crate) fn marker(&self) -> &Path {
        &self.marker
    }
}

impl Drop for RotationLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.marker);
    }
}

/// Stage a symlink beside `target`, then atomically rename it over `link`.
///
/// The link target is relative when the link lives in the target's own
/// directory, so a log directory can be relocated as a unit; otherwise the
/// target is resolved to an absolute path.
#[cfg(unix)]
pub fn update_symlink(target: &Path, link: &Path) -> Result<()> {
    let staged = suffixed(target, SYMLINK_SUFFIX);
    // leftover staging from an abandoned transition
    let _ = fs::remove_file(&staged);

    let dest = if link.parent() == target.parent() {
        match target.file_name() {
            Some(name) => PathBuf::from(name),
            None => target.to_path_buf(),
        }
    } else {
        fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf())
    };

    std::os::unix::fs::symlink(&dest, &staged)?;
    if let Some(dir) = link.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
        }
    }
    fs::rename(&staged, link)?;
    Ok(())
}

#[cfg(not(unix))]
pub fn update_symlink(target: &Path, link: &Path) -> Result<()> {
    let _ = (target, link);
    log::debug!("symlink maintenance is not supported on this platform");
    Ok(())
}

fn suffixed(target: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
