//! Validated sink configuration.
//!
//! Construction is chainable; [`Config::validated`] runs at
//! [`RotateSink::open`](crate::sink::RotateSink::open) and is the last point
//! a configuration error can surface. The running core assumes the result is
//! consistent.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::event::RotationHandler;
use crate::{Error, Result};

/// Retention window applied when neither max age nor max count is set.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(7 * 86_400);

#[derive(Clone)]
pub struct Config {
    pub(crate) directory: PathBuf,
    pub(crate) base_name: String,
    pub(crate) rotation_period: Duration,
    pub(crate) rotation_size: u64,
    pub(crate) max_age: Duration,
    pub(crate) max_count: u32,
    pub(crate) compress: bool,
    pub(crate) link_path: Option<PathBuf>,
    pub(crate) maintenance_interval: Option<Duration>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) handler: Option<Arc<dyn RotationHandler>>,
}

impl Config {
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
            rotation_period: Duration::ZERO,
            rotation_size: 0,
            max_age: Duration::ZERO,
            max_count: 0,
            compress: false,
            link_path: None,
            maintenance_interval: None,
            clock: Arc::new(SystemClock::new()),
            handler: None,
        }
    }

    /// Time between rotations; zero disables time-based rotation. Periods
    /// are whole multiples of a day, matching the date-valued bucket label.
    pub fn rotation_period(mut self, period: Duration) -> Self {
        self.rotation_period = period;
        self
    }

    /// Size threshold in bytes; zero disables size-based rotation.
    pub fn rotation_size(mut self, bytes: u64) -> Self {
        self.rotation_size = bytes;
        self
    }

    /// Delete rotated files older than this window. Mutually exclusive with
    /// [`Config::max_count`].
    pub fn max_age(mut self, age: Duration) -> Self {
        self.max_age = age;
        self
    }

    /// Keep at most this many rotated files. Mutually exclusive with
    /// [`Config::max_age`].
    pub fn max_count(mut self, count: u32) -> Self {
        self.max_count = count;
        self
    }

    /// Gzip rotated files older than the current day.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Maintain a symbolic link pointing at the file currently being written.
    pub fn link_path(mut self, link: impl Into<PathBuf>) -> Self {
        self.link_path = Some(link.into());
        self
    }

    /// Run retention and compression on this interval, off the write path.
    /// Without it, maintenance only runs through
    /// [`RotateSink::run_maintenance`](crate::sink::RotateSink::run_maintenance).
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = Some(interval);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn handler(mut self, handler: Arc<dyn RotationHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Enforce cross-field rules and fill defaults.
    pub(crate) fn validated(mut self) -> Result<Self> {
        if self.base_name.trim().is_empty() {
            return Err(Error::Config("base name is missing"));
        }
        if self.directory.as_os_str().is_empty() {
            return Err(Error::Config("directory is missing"));
        }
        if !self.max_age.is_zero() && self.max_count > 0 {
            return Err(Error::Config("max_age and max_count cannot both be set"));
        }
        if self.max_age.is_zero() && self.max_count == 0 {
            self.max_age = DEFAULT_MAX_AGE;
        }
        if matches!(self.maintenance_interval, Some(interval) if interval.is_zero()) {
            return Err(Error::Config("maintenance interval must be non-zero"));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_seven_day_age() {
        let config = Config::new("/tmp/logs", "app").validated().expect("valid");
        assert_eq!(config.max_age, DEFAULT_MAX_AGE);
        assert_eq!(config.max_count, 0);
    }

    #[test]
    fn test_retention_policies_are_exclusive() {
        let result = Config::new("/tmp/logs", "app")
            .max_age(Duration::from_secs(86_400))
            .max_count(3)
            .validated();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_explicit_count_disables_default_age() {
        let config = Config::new("/tmp/logs", "app")
            .max_count(3)
            .validated()
            .expect("valid");
        assert!(config.max_age.is_zero());
        assert_eq!(config.max_count, 3);
    }

    #[test]
    fn test_missing_name_rejected() {
        assert!(Config::new("/tmp/logs", "  ").validated().is_err());
        assert!(Config::new("", "app").validated().is_err());
    }

    #[test]
    fn test_zero_maintenance_interval_rejected() {
        let result = Config::new("/tmp/logs", "app")
            .maintenance_interval(Duration::ZERO)
            .validated();
        assert!(result.is_err());
    }
}
