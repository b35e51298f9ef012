use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use flate2::read::GzDecoder;
use rotolog::clock::ymd_to_days;
use rotolog::{Config, ManualClock, RotateSink};
use tempfile::tempdir;

const SECS_PER_DAY: i64 = 86_400;

#[test]
fn compresses_past_days_and_leaves_today_alone() {
    let dir = tempdir().expect("tempdir");
    std::fs::write(dir.path().join("app-2024-01-27.log"), b"two days ago\n").expect("seed");
    std::fs::write(dir.path().join("app-2024-01-28.log"), b"yesterday\n").expect("seed");
    std::fs::write(dir.path().join("app-2024-01-29.1.log"), b"earlier today\n").expect("seed");

    let clock = Arc::new(ManualClock::new(ymd_to_days(2024, 1, 29) * SECS_PER_DAY + 3_600));
    let sink = RotateSink::open(
        Config::new(dir.path(), "app")
            .compress(true)
            .max_age(Duration::from_secs(30 * 86_400))
            .clock(clock),
    )
    .expect("open");
    sink.append(b"now\n").expect("write");

    let stats = sink.run_maintenance();
    assert_eq!(stats.compressed, 2);
    assert!(!stats.has_errors());

    // past days turned into gzip siblings
    assert!(!dir.path().join("app-2024-01-27.log").exists());
    assert!(dir.path().join("app-2024-01-27.log.gz").exists());
    assert!(!dir.path().join("app-2024-01-28.log").exists());
    assert!(dir.path().join("app-2024-01-28.log.gz").exists());

    // today's files, active or not, are untouched
    assert!(dir.path().join("app-2024-01-29.1.log").exists());
    assert!(dir.path().join("app-2024-01-29.log").exists());

    let mut decoder = GzDecoder::new(
        std::fs::File::open(dir.path().join("app-2024-01-28.log.gz")).expect("open gz"),
    );
    let mut restored = Vec::new();
    decoder.read_to_end(&mut restored).expect("decode");
    assert_eq!(restored, b"yesterday\n");
}

#[test]
fn interrupted_run_leftover_original_is_reclaimed() {
    let dir = tempdir().expect("tempdir");
    let original = dir.path().join("app-2024-01-28.log");
    let sibling = dir.path().join("app-2024-01-28.log.gz");
    // a prior run compressed the file but died before removing the original
    std::fs::write(&original, b"yesterday\n").expect("seed original");
    std::fs::write(&sibling, b"already compressed").expect("seed sibling");

    let clock = Arc::new(ManualClock::new(ymd_to_days(2024, 1, 29) * SECS_PER_DAY));
    let sink = RotateSink::open(
        Config::new(dir.path(), "app")
            .compress(true)
            .max_age(Duration::from_secs(30 * 86_400))
            .clock(clock),
    )
    .expect("open");

    let stats = sink.run_maintenance();

    // the sibling is trusted, not rebuilt; the leftover original goes away
    assert_eq!(stats.compressed, 0);
    assert!(!original.exists());
    assert!(sibling.exists());
    assert_eq!(
        std::fs::read(&sibling).expect("read sibling"),
        b"already compressed"
    );
}

#[test]
fn active_file_is_never_compressed() {
    let dir = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(ymd_to_days(2024, 1, 28) * SECS_PER_DAY));
    let sink = RotateSink::open(
        Config::new(dir.path(), "app")
            .compress(true)
            .max_age(Duration::from_secs(30 * 86_400))
            .clock(Arc::clone(&clock) as Arc<dyn rotolog::Clock>),
    )
    .expect("open");

    sink.append(b"yesterday's active file\n").expect("write");
    let active = sink.current_file_name().expect("current");

    // a day later the file is no longer "today", but it is still active
    // because nothing has been written since
    clock.advance(Duration::from_secs(86_400));
    let stats = sink.run_maintenance();

    assert_eq!(stats.compressed, 0);
    assert!(active.exists());
    assert!(!dir.path().join("app-2024-01-28.log.gz").exists());
}
