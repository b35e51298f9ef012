//! Gzip compression of rotated family files.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::clock::{self, Clock};
use crate::filename::{FamilyEntry, FileFamily, COMPRESS_SUFFIX};
use crate::stats::MaintenanceStats;
use crate::Result;

/// Compresses rotated files that have aged out of the current day.
///
/// Runs only on the maintenance path. The active file is read through the
/// shared snapshot and is never touched, nor is anything written today: the
/// sink may still reopen today's files after a restart.
pub struct CompressionWorker {
    family: FileFamily,
    clock: Arc<dyn Clock>,
    current: Arc<RwLock<Option<PathBuf>>>,
}

impl CompressionWorker {
    pub(crate) fn new(
        family: FileFamily,
        clock: Arc<dyn Clock>,
        current: Arc<RwLock<Option<PathBuf>>>,
    ) -> Self {
        Self {
            family,
            clock,
            current,
        }
    }

    /// One compression sweep. A failure on one file is recorded and the
    /// sweep continues.
    pub fn compress_eligible(&self) -> Result<MaintenanceStats> {
        let mut stats = MaintenanceStats::new();
        let active = match self.current.read() {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => None,
        };
        let today = clock::local_day(self.clock.as_ref());

        for (path, entry) in self.family.scan()? {
            let FamilyEntry::Log { day, .. } = entry else {
                continue;
            };
            if active.as_deref() == Some(path.as_path()) || day == today {
                continue;
            }
            stats.scanned += 1;

            let sibling = compressed_sibling(&path);
            if sibling.exists() {
                // A prior, possibly interrupted, run already produced the
                // compressed copy; the original is the leftover.
                match fs::remove_file(&path) {
                    Ok(()) => stats.record_removal(),
                    Err(err) => {
                        log::warn!("failed to remove {}: {}", path.display(), err);
                        stats.record_error(format!("{}: {}", path.display(), err));
                    }
                }
                continue;
            }

            match compress_file(&path, &sibling) {
                Ok((original, compressed)) => stats.record_compression(original, compressed),
                Err(err) => {
                    log::warn!("failed to compress {}: {}", path.display(), err);
                    stats.record_error(format!("{}: {}", path.display(), err));
                }
            }
        }
        Ok(stats)
    }
}

pub(crate) fn compressed_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(COMPRESS_SUFFIX);
    PathBuf::from(name)
}

/// Stream `src` into a gzip copy at `dst`, removing `src` only after the
/// encoder finished and the copy is confirmed on disk. A mid-stream failure
/// removes the partial copy and keeps the original, so no interruption ever
/// leaves zero copies of the data.
pub fn compress_file(src: &Path, dst: &Path) -> Result<(u64, u64)> {
    let original_size = fs::metadata(src)?.len();
    if let Err(err) = write_gzip(src, dst) {
        let _ = fs::remove_file(dst);
        return Err(err.into());
    }
    let compressed_size = fs::metadata(dst)?.len();
    fs::remove_file(src)?;
    Ok((original_size, compressed_size))
}

fn write_gzip(src: &Path, dst: &Path) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(src)?);
    let mut encoder = GzEncoder::new(BufWriter::new(File::create(dst)?), Compression::default());
    io::copy(&mut reader, &mut encoder)?;
    let mut out = encoder.finish()?;
    out.flush()?;
    Ok(())
}
