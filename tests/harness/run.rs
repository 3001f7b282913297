//! Run Tests
//!
//! Short full runs: every store grows and every observer sees it.

use crate::common::*;
use notistress::{Harness, ObserverState, RecordingDisplay, RunLoop, StoreKind};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_short_run_publishes_all_metrics() {
    let tmp = temp_dir();
    let display = Arc::new(RecordingDisplay::new());
    let mut harness = Harness::new(quick_config(tmp.path()), display.clone());
    harness.start().unwrap();

    harness.run_for(Duration::from_secs(2));

    let sink = Arc::clone(harness.sink());
    for kind in StoreKind::ALL {
        assert!(sink.snapshot(kind).file_size_bytes > 0, "{} never grew", kind);
        assert!(display.latest(kind).is_some(), "{} never displayed", kind);
    }
    for kind in [StoreKind::Read, StoreKind::Listener, StoreKind::TwoListeners] {
        assert!(sink.snapshot(kind).observed_count > 0, "{} never counted", kind);
    }
    assert!(display
        .latest(StoreKind::WriteOnly)
        .unwrap()
        .starts_with("write only: "));

    harness.shutdown();
    RunLoop::detach_current();
}

#[test]
fn test_both_two_listener_subscriptions_fire() {
    let tmp = temp_dir();
    let mut harness = Harness::new(quick_config(tmp.path()), Arc::new(RecordingDisplay::new()));
    harness.start().unwrap();
    harness.run_for(Duration::from_secs(1));

    let deliveries: Vec<u64> = harness
        .registry()
        .for_kind(StoreKind::TwoListeners)
        .map(|r| r.deliveries())
        .collect();
    assert_eq!(deliveries.len(), 2);
    assert!(deliveries.iter().all(|&d| d > 0), "{:?}", deliveries);

    harness.shutdown();
    RunLoop::detach_current();
}

#[test]
fn test_observer_cycles_and_keeps_receiving() {
    let tmp = temp_dir();
    let mut harness = Harness::new(quick_config(tmp.path()), Arc::new(RecordingDisplay::new()));
    harness.start().unwrap();
    assert_eq!(harness.observer().state(), ObserverState::Running);

    let observer = Arc::clone(harness.observer());
    let mut last_total = 0;
    for _ in 0..3 {
        let cycle = observer.cycles();
        harness.run_for(Duration::from_millis(400));
        let total = observer.total_notifications();
        assert!(total >= last_total);
        last_total = total;
        assert!(observer.cycles() >= cycle);
    }
    assert!(observer.cycles() >= 2, "cycles = {}", observer.cycles());
    assert!(last_total > 0);
    assert!(harness.sink().snapshot(StoreKind::ThreadListener).observed_count > 0);

    harness.shutdown();
    assert_eq!(observer.state(), ObserverState::Stopped);
    RunLoop::detach_current();
}

#[test]
fn test_shutdown_cancels_registrations() {
    let tmp = temp_dir();
    let mut harness = Harness::new(quick_config(tmp.path()), Arc::new(RecordingDisplay::new()));
    harness.start().unwrap();
    harness.run_for(Duration::from_millis(200));

    harness.shutdown();
    assert!(harness.registry().registrations().is_empty());
    assert_eq!(harness.active_generators(), 0);
    assert!(!harness.observer().has_live_loop());

    let cycles = harness.observer().cycles();
    pump_for(Duration::from_millis(300));
    assert_eq!(harness.observer().cycles(), cycles);
    RunLoop::detach_current();
}
