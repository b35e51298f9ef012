//! Statistics for maintenance passes.

use std::time::Duration;

/// Outcome of one maintenance pass (retention, then compression).
#[derive(Debug, Clone, Default)]
pub struct MaintenanceStats {
    /// Family files seen by the scan.
    pub scanned: usize,

    /// Files deleted (markers, expired, or over the count limit).
    pub removed: usize,

    /// Files compressed.
    pub compressed: usize,

    /// Bytes saved by compression.
    pub bytes_saved: u64,

    /// Per-file errors; the pass continues past each one.
    pub errors: Vec<String>,

    /// Wall time of the pass.
    pub duration: Duration,
}

impl MaintenanceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_removal(&mut self) {
        self.removed += 1;
    }

    pub fn record_compression(&mut self, original_size: u64, compressed_size: u64) {
        self.compressed += 1;
        self.bytes_saved += original_size.saturating_sub(compressed_size);
    }

    pub fn record_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Fold another run into this one. Duration is tracked by the caller.
    pub fn merge(&mut self, other: MaintenanceStats) {
        self.scanned += other.scanned;
        self.removed += other.removed;
        self.compressed += other.compressed;
        self.bytes_saved += other.bytes_saved;
        self.errors.extend(other.errors);
    }

    pub fn summary(&self) -> String {
        format!(
            "scanned: {}, removed: {}, compressed: {}, saved: {} bytes, errors: {}, duration: {:?}",
            self.scanned,
            self.removed,
            self.compressed,
            self.bytes_saved,
            self.errors.len(),
            self.duration
        )
    }
}
