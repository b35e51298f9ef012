//! Retention enforcement for rotated family files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::clock::{Clock, SECS_PER_DAY};
use crate::filename::FileFamily;
use crate::stats::MaintenanceStats;
use crate::Result;

/// Which rotated files to keep. The two policies are mutually exclusive by
/// construction; config validation rejects setting both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Delete files whose embedded date is a full day older than the window.
    MaxAge(Duration),
    /// Keep at most this many rotated files.
    MaxCount(u32),
}

/// Deletes expired family files and abandoned transition markers.
///
/// Runs only on the maintenance path. The file the sink is writing right now
/// is read through the shared snapshot and is never a deletion candidate.
pub struct RetentionManager {
    family: FileFamily,
    policy: RetentionPolicy,
    link_path: Option<PathBuf>,
    clock: Arc<dyn Clock>,
    current: Arc<RwLock<Option<PathBuf>>>,
}

impl RetentionManager {
    pub(crate) fn new(
        family: FileFamily,
        policy: RetentionPolicy,
        link_path: Option<PathBuf>,
        clock: Arc<dyn Clock>,
        current: Arc<RwLock<Option<PathBuf>>>,
    ) -> Self {
        Self {
            family,
            policy,
            link_path,
            clock,
            current,
        }
    }

    /// One enforcement sweep: marker cleanup first, then the policy.
    /// A failure on one file is recorded and the sweep continues.
    pub fn enforce(&self) -> Result<MaintenanceStats> {
        let mut stats = MaintenanceStats::new();
        let active = match self.current.read() {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => None,
        };

        let entries = self.family.scan()?;
        stats.scanned = entries.len();

        // A marker still on disk outside a transition window is an abandoned
        // rotation artifact, never log data.
        for (path, entry) in &entries {
            if entry.is_marker() {
                remove(path, &mut stats);
            }
        }

        match self.policy {
            RetentionPolicy::MaxAge(window) => {
                let shifted = self
                    .clock
                    .timezone()
                    .apply_offset(self.clock.unix_now());
                let cutoff_day = (shifted - window.as_secs() as i64).div_euclid(SECS_PER_DAY);
                for (path, entry) in &entries {
                    let Some(day) = entry.day() else { continue };
                    if active.as_deref() == Some(path.as_path()) {
                        continue;
                    }
                    if day < cutoff_day {
                        remove(path, &mut stats);
                    }
                }
            }
            RetentionPolicy::MaxCount(limit) => {
                let link_target = self.resolved_link_target();
                let mut rotated: Vec<(&Path, (i64, u32))> = entries
                    .iter()
                    .filter_map(|(path, entry)| {
                        let key = entry.sort_key()?;
                        if active.as_deref() == Some(path.as_path()) {
                            return None;
                        }
                        if is_link_target(path, link_target.as_deref()) {
                            return None;
                        }
                        Some((path.as_path(), key))
                    })
                    .collect();
                if rotated.len() > limit as usize {
                    rotated.sort_by_key(|(_, key)| *key);
                    let excess = rotated.len() - limit as usize;
                    for (path, _) in rotated.into_iter().take(excess) {
                        remove(path, &mut stats);
                    }
                }
            }
        }
        Ok(stats)
    }

    /// Where the live "current" link points, canonicalized for comparison.
    fn resolved_link_target(&self) -> Option<PathBuf> {
        let link = self.link_path.as_deref()?;
        let dest = fs::read_link(link).ok()?;
        let resolved = if dest.is_absolute() {
            dest
        } else {
            link.parent().unwrap_or(Path::new(".")).join(dest)
        };
        fs::canonicalize(resolved).ok()
    }
}

fn is_link_target(path: &Path, target: Option<&Path>) -> bool {
    let Some(target) = target else { return false };
    if path.file_name() != target.file_name() {
        return false;
    }
    fs::canonicalize(path).ok().as_deref() == Some(target)
}

fn remove(path: &Path, stats: &mut MaintenanceStats) {
    match fs::remove_file(path) {
        Ok(()) => stats.record_removal(),
        Err(err) => {
            log::warn!("failed to remove {}: {}", path.display(), err);
            stats.record_error(format!("{}: {}", path.display(), err));
        }
    }
}
