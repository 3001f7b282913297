//! Mutation Scenarios
//!
//! Single mutations driven by hand against a prepared directory.

use crate::common::*;
use notistress::{
    prepare_directory, HarnessConfig, MetricsPublisher, MetricsSink, Mutation, MutationGenerator,
    MutationOutcome, NotificationRegistry, RecordingDisplay, RunLoop, StoreHandle, StoreKind,
};
use std::sync::Arc;
use std::time::Duration;

struct Scenario {
    _tmp: tempfile::TempDir,
    config: HarnessConfig,
    publisher: MetricsPublisher,
    registry: NotificationRegistry,
}

impl Scenario {
    fn new() -> Scenario {
        let tmp = temp_dir();
        let config = HarnessConfig::new(tmp.path().join("data"));
        prepare_directory(config.data_dir()).unwrap();

        let control = RunLoop::current();
        let sink = MetricsSink::new(config.data_dir(), Arc::new(RecordingDisplay::new()));
        let publisher = MetricsPublisher::new(control, Arc::clone(&sink));
        let registry = NotificationRegistry::new(sink);
        Scenario {
            _tmp: tmp,
            config,
            publisher,
            registry,
        }
    }

    fn generator(&self, queue_index: usize, kind: StoreKind) -> MutationGenerator {
        MutationGenerator::new(queue_index, kind, &self.config, self.publisher.clone())
    }
}

impl Drop for Scenario {
    fn drop(&mut self) {
        self.registry.cancel_all();
        RunLoop::detach_current();
    }
}

#[test]
fn test_insert_fires_listener_once() {
    let mut scenario = Scenario::new();
    scenario.registry.subscribe(StoreKind::Listener).unwrap();

    insert_root(scenario.config.data_dir(), StoreKind::Listener, "0-abc", "0");

    let registration = &scenario.registry.registrations()[0];
    assert!(pump_until(Duration::from_secs(2), || registration.deliveries() >= 1));
    pump_for(Duration::from_millis(100));
    assert_eq!(registration.deliveries(), 1);

    let snapshot = scenario.publisher.sink().snapshot(StoreKind::Listener);
    assert_eq!(snapshot.observed_count, 1);
    assert!(snapshot.file_size_bytes > 0);
}

#[test]
fn test_update_on_empty_group_is_noop() {
    let mut scenario = Scenario::new();
    scenario.registry.subscribe(StoreKind::Listener).unwrap();

    // Queue 6 updates group 5, which nobody has written
    insert_root(scenario.config.data_dir(), StoreKind::Listener, "6-own", "6");
    let registration = &scenario.registry.registrations()[0];
    assert!(pump_until(Duration::from_secs(2), || registration.deliveries() == 1));

    let path = scenario.config.store_path(StoreKind::Listener);
    let version = StoreHandle::open(&path).unwrap().database().version();

    let outcome = scenario
        .generator(6, StoreKind::Listener)
        .perform(Mutation::Update)
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Skipped);

    pump_for(Duration::from_millis(200));
    assert_eq!(registration.deliveries(), 1);
    assert_eq!(StoreHandle::open(&path).unwrap().database().version(), version);
}

#[test]
fn test_update_touches_previous_group() {
    let scenario = Scenario::new();
    let dir = scenario.config.data_dir().to_path_buf();
    insert_root(&dir, StoreKind::WriteOnly, "4-target", "4");
    let before = StoreHandle::open(StoreKind::WriteOnly.file_path(&dir))
        .unwrap()
        .object("4-target")
        .unwrap()
        .timestamp;

    std::thread::sleep(Duration::from_millis(2));
    let outcome = scenario
        .generator(5, StoreKind::WriteOnly)
        .perform(Mutation::Update)
        .unwrap();
    assert_eq!(outcome, MutationOutcome::Updated("4-target".to_string()));

    let after = StoreHandle::open(StoreKind::WriteOnly.file_path(&dir))
        .unwrap()
        .object("4-target")
        .unwrap()
        .timestamp;
    assert!(after > before);
}

#[test]
fn test_append_child_to_childless_root() {
    let scenario = Scenario::new();
    let dir = scenario.config.data_dir().to_path_buf();
    // Queue 16 appends to group 14
    insert_root(&dir, StoreKind::Read, "14-root", "14");

    let outcome = scenario
        .generator(16, StoreKind::Read)
        .perform(Mutation::AppendChild)
        .unwrap();
    let MutationOutcome::ChildAppended { root_id, child_id } = outcome else {
        panic!("expected an appended child, got {:?}", outcome);
    };
    assert_eq!(root_id, "14-root");
    assert!(child_id.starts_with("14-"));

    let handle = StoreHandle::open(StoreKind::Read.file_path(&dir)).unwrap();
    let root = handle.object("14-root").unwrap();
    assert_eq!(root.children.len(), 1);
    assert!(root.has_child(&child_id));
    assert!(handle.child(&child_id).is_some());
}

#[test]
fn test_insert_uses_queue_group() {
    let scenario = Scenario::new();
    let outcome = scenario
        .generator(3, StoreKind::TwoListeners)
        .perform(Mutation::Insert)
        .unwrap();
    let MutationOutcome::Inserted(id) = outcome else {
        panic!("expected an insert, got {:?}", outcome);
    };
    assert!(id.starts_with("3-"));

    let handle = StoreHandle::open(scenario.config.store_path(StoreKind::TwoListeners)).unwrap();
    assert_eq!(handle.object(&id).unwrap().group_id, "3");
}

#[test]
fn test_stores_are_isolated() {
    let scenario = Scenario::new();
    scenario
        .generator(0, StoreKind::Listener)
        .perform(Mutation::Insert)
        .unwrap();

    for kind in StoreKind::ALL {
        let count = StoreHandle::open(scenario.config.store_path(kind))
            .unwrap()
            .objects()
            .count();
        let expected = if kind == StoreKind::Listener { 1 } else { 0 };
        assert_eq!(count, expected, "{}", kind);
    }
}
