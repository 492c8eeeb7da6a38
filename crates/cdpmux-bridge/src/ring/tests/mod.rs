use crate::ring::{LogLevel, LogRing};

#[test]
fn test_ring_records_in_order() {
    let ring = LogRing::new(10);
    ring.record(LogLevel::Info, "first");
    ring.record(LogLevel::Info, "second");

    let entries = ring.snapshot(None, None);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "first");
    assert_eq!(entries[1].message, "second");
}

#[test]
fn test_ring_evicts_oldest_at_capacity() {
    let ring = LogRing::new(3);
    for i in 0..5 {
        ring.record(LogLevel::Info, format!("entry {i}"));
    }

    let entries = ring.snapshot(None, None);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].message, "entry 2");
    assert_eq!(entries[2].message, "entry 4");
}

#[test]
fn test_snapshot_limit_keeps_newest() {
    let ring = LogRing::new(10);
    for i in 0..6 {
        ring.record(LogLevel::Info, format!("entry {i}"));
    }

    let entries = ring.snapshot(Some(2), None);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].message, "entry 4");
    assert_eq!(entries[1].message, "entry 5");
}

#[test]
fn test_snapshot_level_filter() {
    let ring = LogRing::new(10);
    ring.record(LogLevel::Debug, "noise");
    ring.record(LogLevel::Warn, "dropped message");
    ring.record(LogLevel::Error, "socket fault");

    let entries = ring.snapshot(None, Some(LogLevel::Warn));
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.level >= LogLevel::Warn));
}

#[test]
fn test_level_parsing() {
    assert_eq!("warn".parse::<LogLevel>(), Ok(LogLevel::Warn));
    assert_eq!("WARNING".parse::<LogLevel>(), Ok(LogLevel::Warn));
    assert_eq!("error".parse::<LogLevel>(), Ok(LogLevel::Error));
    assert!("loud".parse::<LogLevel>().is_err());
}

#[test]
fn test_entry_serialization_shape() {
    let ring = LogRing::new(1);
    ring.record(LogLevel::Warn, "agent link lost");

    let entries = ring.snapshot(None, None);
    let json = serde_json::to_string(&entries[0]).unwrap();
    assert!(json.contains("\"level\":\"warn\""));
    assert!(json.contains("\"message\":\"agent link lost\""));
    assert!(json.contains("timestamp"));
}

#[test]
fn test_zero_capacity_is_clamped() {
    let ring = LogRing::new(0);
    ring.record(LogLevel::Info, "kept");
    assert_eq!(ring.len(), 1);
}
