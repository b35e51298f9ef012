//! Time source abstraction and the calendar math behind bucket labels.
//!
//! Rotation decisions never read the wall clock directly. The sink is handed
//! a [`Clock`] so tests can pin or advance time without waiting out real
//! rotation intervals.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{Error, Result};

pub(crate) const SECS_PER_DAY: i64 = 86_400;

/// Zone offset applied when computing bucket boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timezone {
    Utc,
    /// Fixed offset in seconds east of UTC.
    Fixed(i32),
}

impl Timezone {
    /// Parse `"UTC"` or a fixed offset such as `"+0800"` / `"-0530"`.
    pub fn parse(s: &str) -> Result<Self> {
        if s == "UTC" {
            return Ok(Timezone::Utc);
        }
        let bytes = s.as_bytes();
        if bytes.len() == 5 && (bytes[0] == b'+' || bytes[0] == b'-') {
            let hours: i32 = s[1..3]
                .parse()
                .map_err(|_| Error::Config("invalid timezone offset"))?;
            let minutes: i32 = s[3..5]
                .parse()
                .map_err(|_| Error::Config("invalid timezone offset"))?;
            let sign = if bytes[0] == b'-' { -1 } else { 1 };
            return Ok(Timezone::Fixed(sign * (hours * 3600 + minutes * 60)));
        }
        Err(Error::Config("unknown timezone"))
    }

    pub fn offset_seconds(&self) -> i32 {
        match self {
            Timezone::Utc => 0,
            Timezone::Fixed(offset) => *offset,
        }
    }

    /// Shift an epoch timestamp into this zone's wall-clock frame.
    ///
    /// Bucket boundaries are computed as if the local wall-clock time were
    /// UTC, then reinterpreted in the original zone. Truncating the raw epoch
    /// value instead would skew boundaries whenever the offset is not a whole
    /// multiple of the rotation period.
    pub fn apply_offset(&self, unix_secs: i64) -> i64 {
        unix_secs + self.offset_seconds() as i64
    }
}

/// Capability providing "now". One per sink, injected through the config.
pub trait Clock: Send + Sync {
    /// Seconds since the Unix epoch.
    fn unix_now(&self) -> i64;

    /// Zone bucket boundaries are computed in.
    fn timezone(&self) -> Timezone {
        Timezone::Utc
    }
}

/// Wall clock, optionally with a fixed zone offset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock {
    timezone: Option<Timezone>,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timezone(timezone: Timezone) -> Self {
        Self {
            timezone: Some(timezone),
        }
    }
}

impl Clock for SystemClock {
    fn unix_now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    fn timezone(&self) -> Timezone {
        self.timezone.unwrap_or(Timezone::Utc)
    }
}

/// Deterministic clock for tests: set or advance it explicitly.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
    timezone: Timezone,
}

impl ManualClock {
    pub fn new(unix_secs: i64) -> Self {
        Self {
            now: AtomicI64::new(unix_secs),
            timezone: Timezone::Utc,
        }
    }

    pub fn with_timezone(unix_secs: i64, timezone: Timezone) -> Self {
        Self {
            now: AtomicI64::new(unix_secs),
            timezone,
        }
    }

    pub fn set(&self, unix_secs: i64) {
        self.now.store(unix_secs, Ordering::Release);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_secs() as i64, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn unix_now(&self) -> i64 {
        self.now.load(Ordering::Acquire)
    }

    fn timezone(&self) -> Timezone {
        self.timezone
    }
}

/// Calendar day of "now" in the clock's zone.
pub(crate) fn local_day(clock: &dyn Clock) -> i64 {
    clock
        .timezone()
        .apply_offset(clock.unix_now())
        .div_euclid(SECS_PER_DAY)
}

/// Calendar day the current bucket starts on.
///
/// The shifted time is truncated to the rotation period; a zero (disabled)
/// period truncates to the day. The naming contract embeds a date, so the
/// bucket key has day granularity and periods are whole multiples of a day.
pub(crate) fn bucket_day(clock: &dyn Clock, period: Duration) -> i64 {
    let shifted = clock.timezone().apply_offset(clock.unix_now());
    let step = match period.as_secs() as i64 {
        s if s > 0 => s,
        _ => SECS_PER_DAY,
    };
    (shifted.div_euclid(step) * step).div_euclid(SECS_PER_DAY)
}

/// `YYYY-MM-DD` label for a day number.
pub fn format_date(days: i64) -> String {
    let (year, month, day) = days_to_ymd(days);
    format!("{:04}-{:02}-{:02}", year, month, day)
}

/// Parse a `YYYY-MM-DD` label back to its day number.
pub fn parse_date(s: &str) -> Option<i64> {
    let bytes = s.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let year: i32 = s[0..4].parse().ok()?;
    let month: u8 = s[5..7].parse().ok()?;
    let day: u8 = s[8..10].parse().ok()?;
    if !(1970..=2100).contains(&year) || !(1..=12).contains(&month) {
        return None;
    }
    if day < 1 || day > days_in_month(year, month) {
        return None;
    }
    Some(ymd_to_days(year, month, day))
}

/// Convert days since the Unix epoch to (year, month, day).
///
/// Valid for 1970..=2100.
pub fn days_to_ymd(mut days: i64) -> (i32, u8, u8) {
    let mut year = 1970;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let mut month = 1;
    while days >= days_in_month(year, month) as i64 {
        days -= days_in_month(year, month) as i64;
        month += 1;
    }

    (year, month, (days + 1) as u8)
}

/// Convert (year, month, day) to days since the Unix epoch.
pub fn ymd_to_days(year: i32, month: u8, day: u8) -> i64 {
    let mut days = 0i64;
    for y in 1970..year {
        days += if is_leap_year(y) { 366 } else { 365 };
    }
    for m in 1..month {
        days += days_in_month(year, m) as i64;
    }
    days + (day as i64 - 1)
}

fn days_in_month(year: i32, month: u8) -> u8 {
    const DAYS: [u8; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
    if month == 2 && is_leap_year(year) {
        29
    } else {
        DAYS[(month - 1) as usize]
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_to_ymd() {
        assert_eq!(days_to_ymd(0), (1970, 1, 1));
        assert_eq!(days_to_ymd(10957), (2000, 1, 1));
        assert_eq!(days_to_ymd(11016), (2000, 2, 29));
        assert_eq!(days_to_ymd(19751), (2024, 1, 29));
    }

    #[test]
    fn test_ymd_round_trip() {
        for days in [0, 58, 10957, 11016, 19751, 20675] {
            let (y, m, d) = days_to_ymd(days);
            assert_eq!(ymd_to_days(y, m, d), days);
        }
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("1970-01-01"), Some(0));
        assert_eq!(parse_date("2024-01-29"), Some(19751));
        assert_eq!(parse_date("2024-02-30"), None);
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date("2024-1-29"), None);
    }

    #[test]
    fn test_timezone_parse() {
        assert_eq!(Timezone::parse("UTC").unwrap(), Timezone::Utc);
        assert_eq!(
            Timezone::parse("+0800").unwrap().offset_seconds(),
            8 * 3600
        );
        assert_eq!(
            Timezone::parse("-0530").unwrap().offset_seconds(),
            -(5 * 3600 + 30 * 60)
        );
        assert!(Timezone::parse("Mars/Olympus").is_err());
    }

    #[test]
    fn test_bucket_day_shifts_with_zone() {
        // 2024-01-28 23:00:00 UTC is already 2024-01-29 in UTC+8.
        let utc_secs = 19751 * SECS_PER_DAY - 3600;
        let utc = ManualClock::new(utc_secs);
        assert_eq!(bucket_day(&utc, Duration::from_secs(86_400)), 19750);

        let shanghai = ManualClock::with_timezone(utc_secs, Timezone::Fixed(8 * 3600));
        assert_eq!(bucket_day(&shanghai, Duration::from_secs(86_400)), 19751);
    }

    #[test]
    fn test_bucket_day_disabled_period_truncates_to_day() {
        let clock = ManualClock::new(19751 * SECS_PER_DAY + 12 * 3600);
        assert_eq!(bucket_day(&clock, Duration::ZERO), 19751);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(100);
        clock.advance(Duration::from_secs(50));
        assert_eq!(clock.unix_now(), 150);
        clock.set(10);
        assert_eq!(clock.unix_now(), 10);
    }
}
