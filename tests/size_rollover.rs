use std::sync::Arc;

use rotolog::clock::ymd_to_days;
use rotolog::{Config, ManualClock, RotateSink};
use tempfile::tempdir;

const SECS_PER_DAY: i64 = 86_400;

#[test]
fn write_that_crosses_threshold_lands_in_fresh_file() {
    let dir = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(ymd_to_days(2024, 1, 29) * SECS_PER_DAY + 3_600));
    let sink = RotateSink::open(
        Config::new(dir.path(), "app")
            .rotation_size(100)
            .clock(clock),
    )
    .expect("open");

    assert_eq!(sink.append(&[b'a'; 60]).expect("first write"), 60);
    let first = sink.current_file_name().expect("current after first");
    assert_eq!(first, dir.path().join("app-2024-01-29.log"));

    assert_eq!(sink.append(&[b'b'; 60]).expect("second write"), 60);
    let second = sink.current_file_name().expect("current after second");
    assert_eq!(second, dir.path().join("app-2024-01-29.1.log"));

    // the old file was fully flushed before the switch
    assert_eq!(std::fs::metadata(&first).expect("stat first").len(), 60);
    assert_eq!(std::fs::metadata(&second).expect("stat second").len(), 60);
    assert_eq!(
        std::fs::read(&first).expect("read first"),
        vec![b'a'; 60]
    );
    assert_eq!(
        std::fs::read(&second).expect("read second"),
        vec![b'b'; 60]
    );
}

#[test]
fn oversized_record_still_lands_somewhere() {
    let dir = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(ymd_to_days(2024, 1, 29) * SECS_PER_DAY));
    let sink = RotateSink::open(
        Config::new(dir.path(), "app")
            .rotation_size(100)
            .clock(clock),
    )
    .expect("open");

    // larger than the threshold, but the first file is empty
    assert_eq!(sink.append(&[b'x'; 150]).expect("oversized write"), 150);
    let first = sink.current_file_name().expect("current");
    assert_eq!(std::fs::metadata(&first).expect("stat").len(), 150);

    // the next write rotates away from the over-threshold file
    sink.append(b"y").expect("next write");
    let second = sink.current_file_name().expect("current after rotation");
    assert_ne!(first, second);
    assert_eq!(std::fs::metadata(&first).expect("stat first").len(), 150);
}

#[test]
fn collision_indices_ascend_past_existing_files() {
    let dir = tempdir().expect("tempdir");
    for name in [
        "app-2024-01-29.log",
        "app-2024-01-29.1.log",
        "app-2024-01-29.2.log",
    ] {
        std::fs::write(dir.path().join(name), vec![0u8; 100]).expect("seed file");
    }

    let clock = Arc::new(ManualClock::new(ymd_to_days(2024, 1, 29) * SECS_PER_DAY));
    let sink = RotateSink::open(
        Config::new(dir.path(), "app")
            .rotation_size(100)
            .clock(clock),
    )
    .expect("open");

    sink.append(b"fresh").expect("write");
    assert_eq!(
        sink.current_file_name().expect("current"),
        dir.path().join("app-2024-01-29.3.log")
    );
}

#[test]
fn generation_increases_once_per_rotation() {
    let dir = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(ymd_to_days(2024, 1, 29) * SECS_PER_DAY));
    let sink = RotateSink::open(
        Config::new(dir.path(), "app")
            .rotation_size(100)
            .clock(clock),
    )
    .expect("open");

    assert_eq!(sink.generation(), 0);
    sink.append(&[b'a'; 10]).expect("write");
    assert_eq!(sink.generation(), 1);

    // no rotation needed, generation holds
    sink.append(&[b'a'; 10]).expect("write");
    assert_eq!(sink.generation(), 1);

    sink.append(&[b'a'; 90]).expect("crossing write");
    assert_eq!(sink.generation(), 2);
}
