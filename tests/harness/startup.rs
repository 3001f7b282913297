//! Startup Tests
//!
//! Working directory preparation and generator spawning.

use crate::common::*;
use notistress::{
    file_size_bytes, prepare_directory, Harness, RecordingDisplay, RunLoop, StoreHandle,
    StoreKind,
};
use std::fs;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_prepare_directory_wipes_stale_files() {
    let tmp = temp_dir();
    let dir = tmp.path().join("data");
    fs::create_dir_all(&dir).unwrap();
    insert_root(&dir, StoreKind::Listener, "0-stale", "0");
    fs::write(dir.join("leftover.txt"), b"junk").unwrap();

    prepare_directory(&dir).unwrap();

    assert!(dir.is_dir());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    let handle = StoreHandle::open(StoreKind::Listener.file_path(&dir)).unwrap();
    assert_eq!(handle.objects().count(), 0);
}

#[test]
fn test_store_files_empty_before_first_write() {
    let tmp = temp_dir();
    let dir = tmp.path().join("data");
    prepare_directory(&dir).unwrap();

    for kind in StoreKind::ALL {
        let path = kind.file_path(&dir);
        assert_eq!(file_size_bytes(&path).unwrap(), 0, "{} before open", kind);
        let _handle = StoreHandle::open(&path).unwrap();
        assert_eq!(file_size_bytes(&path).unwrap(), 0, "{} after open", kind);
    }
}

#[test]
fn test_prepare_directory_creates_missing_dir() {
    let tmp = temp_dir();
    let dir = tmp.path().join("a").join("b");
    prepare_directory(&dir).unwrap();
    assert!(dir.is_dir());
}

#[test]
fn test_every_generator_stays_active() {
    let tmp = temp_dir();
    let config = quick_config(tmp.path());
    let expected = config.generator_count();

    let mut harness = Harness::new(config, Arc::new(RecordingDisplay::new()));
    harness.start().unwrap();
    assert_eq!(harness.spawned_generators(), expected);
    assert_eq!(harness.spawned_generators(), 4 * 5);

    harness.run_for(Duration::from_millis(500));
    assert_eq!(harness.active_generators(), expected);

    harness.shutdown();
    RunLoop::detach_current();
}

#[test]
fn test_start_twice_is_rejected() {
    let tmp = temp_dir();
    let mut harness = Harness::new(quick_config(tmp.path()), Arc::new(RecordingDisplay::new()));
    harness.start().unwrap();
    assert!(harness.start().is_err());
    assert_eq!(harness.registry().registrations().len(), 3);
    harness.shutdown();
    RunLoop::detach_current();
}
