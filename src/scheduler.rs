//! Background maintenance scheduling, off the write path.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::compress::CompressionWorker;
use crate::retention::RetentionManager;
use crate::stats::MaintenanceStats;

/// Runs retention, then compression: once immediately at spawn so a long
/// interval never leaves stale files unattended after process start, then on
/// every interval tick. Passes share nothing with the write path beyond the
/// current-file snapshot.
pub struct MaintenanceScheduler {
    shutdown: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceScheduler {
    pub(crate) fn spawn(
        interval: Duration,
        retention: RetentionManager,
        compressor: Option<CompressionWorker>,
    ) -> Self {
        let shutdown = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_shutdown = Arc::clone(&shutdown);
        let handle = thread::spawn(move || {
            run_pass(&retention, compressor.as_ref());
            let (stopped, signal) = &*thread_shutdown;
            let mut guard = stopped.lock().unwrap_or_else(|e| e.into_inner());
            loop {
                let (next, timeout) = signal
                    .wait_timeout(guard, interval)
                    .unwrap_or_else(|e| e.into_inner());
                guard = next;
                if *guard {
                    break;
                }
                if timeout.timed_out() {
                    // the stop flag lock is never held across a pass
                    drop(guard);
                    run_pass(&retention, compressor.as_ref());
                    guard = stopped.lock().unwrap_or_else(|e| e.into_inner());
                }
            }
        });
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Idempotent; joins the worker.
    pub fn stop(&mut self) {
        let (stopped, signal) = &*self.shutdown;
        if let Ok(mut guard) = stopped.lock() {
            *guard = true;
        }
        signal.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One maintenance pass: retention, then compression. A failed stage is
/// recorded and never aborts the other.
pub(crate) fn run_pass(
    retention: &RetentionManager,
    compressor: Option<&CompressionWorker>,
) -> MaintenanceStats {
    let start = Instant::now();
    let mut stats = match retention.enforce() {
        Ok(stats) => stats,
        Err(err) => {
            log::warn!("retention pass failed: {err}");
            let mut stats = MaintenanceStats::new();
            stats.record_error(err.to_string());
            stats
        }
    };
    if let Some(worker) = compressor {
        match worker.compress_eligible() {
            Ok(compressed) => stats.merge(compressed),
            Err(err) => {
                log::warn!("compression pass failed: {err}");
                stats.record_error(err.to_string());
            }
        }
    }
    stats.duration = start.elapsed();
    log::debug!("maintenance pass: {}", stats.summary());
    stats
}
