//! Stress Tests
//!
//! Long runs with the fixed parameters. All marked #[ignore] for opt-in execution.
//! Run with: cargo test --test harness stress -- --ignored

use crate::common::*;
use notistress::{Harness, HarnessConfig, RecordingDisplay, RunLoop, StoreKind};
use std::sync::Arc;
use std::time::Duration;

/// Fixed-parameter run long enough for several observer cycles
#[test]
#[ignore]
fn stress_fixed_run_soak() {
    let tmp = temp_dir();
    let config = HarnessConfig::new(tmp.path().join("data"));
    let generators = config.generator_count();
    let mut harness = Harness::new(config, Arc::new(RecordingDisplay::new()));
    harness.start().unwrap();

    let observer = Arc::clone(harness.observer());
    let mut last_total = 0;
    for _ in 0..12 {
        harness.run_for(Duration::from_secs(5));
        assert_eq!(harness.active_generators(), generators);
        let total = observer.total_notifications();
        assert!(total >= last_total);
        last_total = total;
    }

    assert!(observer.cycles() >= 3);
    for kind in StoreKind::ALL {
        assert!(harness.sink().snapshot(kind).file_size_bytes > 0, "{}", kind);
    }
    harness.shutdown();
    RunLoop::detach_current();
}

/// Rapid observer cycling under heavy write load
#[test]
#[ignore]
fn stress_rapid_observer_cycling() {
    let tmp = temp_dir();
    let config = quick_config(tmp.path())
        .with_queue_count(16)
        .with_observer_cycle(
            Duration::from_millis(20)..Duration::from_millis(50),
            Duration::from_millis(1)..Duration::from_millis(10),
        )
        .with_loop_check_interval(Duration::from_millis(20));
    let mut harness = Harness::new(config, Arc::new(RecordingDisplay::new()));
    harness.start().unwrap();

    harness.run_for(Duration::from_secs(20));

    let observer = harness.observer();
    assert!(observer.cycles() >= 100, "cycles = {}", observer.cycles());
    assert!(observer.total_notifications() > 0);
    harness.shutdown();
    RunLoop::detach_current();
}
