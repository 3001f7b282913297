//! Shared test utilities for the harness integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

use notistress::{HarnessConfig, RootEntity, RunLoop, StoreHandle, StoreKind, Timestamp};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// A configuration small and fast enough for a test run inside `dir`.
pub fn quick_config(dir: &Path) -> HarnessConfig {
    HarnessConfig::new(dir.join("data"))
        .with_queue_count(3)
        .with_write_delay(Duration::from_millis(5)..Duration::from_millis(10))
        .with_observer_cycle(
            Duration::from_millis(200)..Duration::from_millis(300),
            Duration::from_millis(20)..Duration::from_millis(50),
        )
        .with_loop_check_interval(Duration::from_millis(100))
}

/// Fresh temporary directory.
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

/// Drive the calling thread's run loop until `done` holds or `timeout` passes.
pub fn pump_until(timeout: Duration, done: impl Fn() -> bool) -> bool {
    let run_loop = RunLoop::current();
    let deadline = Instant::now() + timeout;
    while !done() {
        if Instant::now() > deadline {
            return false;
        }
        run_loop.run_once(Duration::from_millis(10));
    }
    true
}

/// Drive the calling thread's run loop for `duration`.
pub fn pump_for(duration: Duration) {
    let run_loop = RunLoop::current();
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        run_loop.run_once(Duration::from_millis(10));
    }
}

/// Upsert one childless root into `kind`'s store under `dir`.
pub fn insert_root(dir: &Path, kind: StoreKind, id: &str, group: &str) {
    let mut handle = StoreHandle::open(kind.file_path(dir)).expect("open store");
    handle
        .write(|txn| {
            txn.upsert_root(RootEntity::new(id, id, Timestamp::now(), group));
            Ok(())
        })
        .expect("insert root");
}
