//! The rotation engine: one append-only sink that swaps the underlying file
//! when a time boundary or size threshold is crossed.
//!
//! All writers serialize through one in-process lock guarding the triple
//! (active handle, active path, generation). The cross-process lock marker
//! is taken only for the transition window itself, and losing it is not an
//! error for an ordinary write: the record lands in the previous file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::clock;
use crate::compress::CompressionWorker;
use crate::config::Config;
use crate::event::{EventDispatcher, RotationEvent};
use crate::filename::{FileFamily, NameGenerator};
use crate::lock::{self, RotationLock};
use crate::retention::{RetentionManager, RetentionPolicy};
use crate::scheduler::{self, MaintenanceScheduler};
use crate::stats::MaintenanceStats;
use crate::{Error, Result};

struct WriterState {
    out: Option<File>,
    current: Option<PathBuf>,
    generation: u64,
    namer: NameGenerator,
    closed: bool,
}

enum RotateMode {
    /// Rotate only when the decision algorithm requires it; on a failed
    /// transition, fall back to the previous file.
    Auto,
    /// Rotate unconditionally onto a fresh name and surface any failure.
    Forced,
}

/// A write destination that rotates the file underneath its callers.
pub struct RotateSink {
    config: Config,
    family: FileFamily,
    state: Mutex<WriterState>,
    current: Arc<RwLock<Option<PathBuf>>>,
    events: Option<EventDispatcher>,
    scheduler: Option<MaintenanceScheduler>,
}

impl RotateSink {
    /// Validate `config` and build the sink. No file is touched until the
    /// first write or an explicit [`RotateSink::rotate`]; the maintenance
    /// thread, when configured, starts immediately.
    pub fn open(config: Config) -> Result<Self> {
        let config = config.validated()?;
        let family = FileFamily::new(&config.directory, config.base_name.clone());
        let current: Arc<RwLock<Option<PathBuf>>> = Arc::new(RwLock::new(None));
        let events = config.handler.clone().map(EventDispatcher::spawn);
        let scheduler = config.maintenance_interval.map(|interval| {
            MaintenanceScheduler::spawn(
                interval,
                retention_for(&config, &family, &current),
                compressor_for(&config, &family, &current),
            )
        });
        Ok(Self {
            state: Mutex::new(WriterState {
                out: None,
                current: None,
                generation: 0,
                namer: NameGenerator::new(family.clone()),
                closed: false,
            }),
            config,
            family,
            current,
            events,
            scheduler,
        })
    }

    /// Append to the active file, rotating first when a boundary or
    /// threshold has been crossed. Indistinguishable from a plain append
    /// except for the possible switch of the underlying file.
    pub fn append(&self, buf: &[u8]) -> Result<usize> {
        let mut state = self.state.lock().map_err(|_| Error::LockPoisoned)?;
        if state.closed {
            return Err(Error::Closed);
        }
        self.ensure_writer(&mut state, RotateMode::Auto, buf.len() as u64)?;
        let out = state.out.as_mut().ok_or(Error::NoActiveFile)?;
        Ok(out.write(buf)?)
    }

    /// Unconditionally switch to a fresh file, as an administrative rotation
    /// request would. Unlike the write path, failure is surfaced: this is
    /// the one entry point whose caller needs a definitive answer.
    pub fn rotate(&self) -> Result<()> {
        let mut state = self.state.lock().map_err(|_| Error::LockPoisoned)?;
        if state.closed {
            return Err(Error::Closed);
        }
        self.ensure_writer(&mut state, RotateMode::Forced, 0)
    }

    /// Snapshot of the path currently receiving writes. Safe to call
    /// concurrently with writes; `None` until the first file is opened.
    pub fn current_file_name(&self) -> Option<PathBuf> {
        match self.current.read() {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => None,
        }
    }

    /// Rotations performed by this sink instance. Strictly increasing, never
    /// reused, and reset by a restart; only intra-process ordering holds.
    pub fn generation(&self) -> u64 {
        self.state
            .lock()
            .map(|state| state.generation)
            .unwrap_or(0)
    }

    /// One synchronous maintenance pass: retention, then compression when
    /// enabled. The interval thread runs the same pass.
    pub fn run_maintenance(&self) -> MaintenanceStats {
        let retention = retention_for(&self.config, &self.family, &self.current);
        let compressor = compressor_for(&self.config, &self.family, &self.current);
        scheduler::run_pass(&retention, compressor.as_ref())
    }

    /// Stop accepting writes and release the active handle. Idempotent.
    /// Callers serialize shutdown after their last write.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.stop();
        }
        if let Some(mut events) = self.events.take() {
            events.stop();
        }
        let mut state = self.state.lock().map_err(|_| Error::LockPoisoned)?;
        state.closed = true;
        state.out.take();
        Ok(())
    }

    /// Rotate-or-not, evaluated under the state lock on every write.
    ///
    /// `incoming` is the size of the write about to happen: a write that
    /// would carry the active file across the threshold rotates first, so
    /// the old file never exceeds the limit. An empty active file absorbs
    /// even an oversized record; it has to land somewhere.
    fn ensure_writer(&self, state: &mut WriterState, mode: RotateMode, incoming: u64) -> Result<()> {
        let bucket_day = clock::bucket_day(self.config.clock.as_ref(), self.config.rotation_period);
        let label = clock::format_date(bucket_day);
        let threshold = self.config.rotation_size;

        let mut need_rotate = false;
        match (&state.current, &state.out) {
            (Some(path), Some(_)) => match fs::metadata(path) {
                // removed or relocated underneath us
                Err(_) => need_rotate = true,
                Ok(meta) => {
                    if threshold > 0 && meta.len() > 0 && meta.len() + incoming >= threshold {
                        // size rotation: same bucket, next index
                        need_rotate = true;
                    } else if !self.config.rotation_period.is_zero() {
                        match self.family.entry_of(path).and_then(|entry| entry.day()) {
                            Some(day) if day == bucket_day => {}
                            _ => need_rotate = true,
                        }
                    }
                }
            },
            _ => need_rotate = true,
        }

        let forced = matches!(mode, RotateMode::Forced);
        if !need_rotate && !forced {
            return Ok(());
        }

        // A candidate only qualifies for reuse if this write still fits
        // under the threshold once appended to it.
        let reuse_below = if threshold == 0 {
            0
        } else {
            threshold.saturating_sub(incoming).max(1)
        };
        let candidate = state.namer.next_candidate(&label, reuse_below, forced);

        let opened = open_append(&candidate);
        let new_out = match opened {
            Ok(file) => file,
            Err(err) => return self.rotation_fallback(state, err.into(), forced),
        };

        // Cross-process exclusion spans only this transition window. Either
        // it succeeds immediately or another process owns the rotation.
        let transition = (|| -> Result<()> {
            let _claim = RotationLock::acquire(&candidate)?;
            if let Some(link) = &self.config.link_path {
                lock::update_symlink(&candidate, link)?;
            }
            Ok(())
        })();
        if let Err(err) = transition {
            // the partially-opened handle must not leak
            drop(new_out);
            return self.rotation_fallback(state, err, forced);
        }

        let previous = state.current.replace(candidate.clone());
        // the previous handle closes as it is replaced
        state.out = Some(new_out);
        state.generation += 1;
        if let Ok(mut snapshot) = self.current.write() {
            *snapshot = Some(candidate.clone());
        }
        if let Some(events) = &self.events {
            events.dispatch(RotationEvent {
                previous,
                current: candidate,
            });
        }
        Ok(())
    }

    /// Failed rotations are fatal only when the caller demanded one or there
    /// is no previous file to keep writing to.
    fn rotation_fallback(&self, state: &mut WriterState, err: Error, forced: bool) -> Result<()> {
        if forced || state.out.is_none() {
            return Err(err);
        }
        if let Some(current) = &state.current {
            log::warn!(
                "rotation failed, continuing on {}: {}",
                current.display(),
                err
            );
        }
        Ok(())
    }

    fn flush_current(&self) -> io::Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, Error::LockPoisoned))?;
        match state.out.as_mut() {
            Some(out) => out.flush(),
            None => Ok(()),
        }
    }
}

impl Write for RotateSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_current()
    }
}

impl Write for &RotateSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.append(buf)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_current()
    }
}

fn open_append(candidate: &Path) -> io::Result<File> {
    if let Some(dir) = candidate.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(candidate)
}

fn retention_for(
    config: &Config,
    family: &FileFamily,
    current: &Arc<RwLock<Option<PathBuf>>>,
) -> RetentionManager {
    let policy = if config.max_count > 0 {
        RetentionPolicy::MaxCount(config.max_count)
    } else {
        RetentionPolicy::MaxAge(config.max_age)
    };
    RetentionManager::new(
        family.clone(),
        policy,
        config.link_path.clone(),
        Arc::clone(&config.clock),
        Arc::clone(current),
    )
}

fn compressor_for(
    config: &Config,
    family: &FileFamily,
    current: &Arc<RwLock<Option<PathBuf>>>,
) -> Option<CompressionWorker> {
    config.compress.then(|| {
        CompressionWorker::new(
            family.clone(),
            Arc::clone(&config.clock),
            Arc::clone(current),
        )
    })
}
