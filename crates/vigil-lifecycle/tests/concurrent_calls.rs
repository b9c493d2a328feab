//! Many calls running through one manager at once

use std::sync::Arc;
use std::thread;
use vigil_core::{CallIdAllocator, HandlerDescriptor, Scope, SharedContext};
use vigil_lifecycle::{Lifecycle, LifecycleManager};
use vigil_testkit::{fixtures, init_test_tracing, EventLog, RecordingTarget};

#[test]
fn test_concurrent_calls_keep_their_own_ordering() {
    init_test_tracing();
    let log = EventLog::new();
    let mut metadata = fixtures::cart_hierarchy();
    metadata.attach_handler(
        Scope::of_type("CartTest"),
        HandlerDescriptor::new(fixtures::recording_handler_type("outer", &log)).with_priority(-1),
    );
    metadata.attach_handler(
        Scope::method("CartTest", "adds_item"),
        HandlerDescriptor::new(fixtures::recording_handler_type("inner", &log)),
    );
    let metadata = Arc::new(metadata);
    let manager = Arc::new(LifecycleManager::standard(Arc::clone(&metadata)));
    let allocator = Arc::new(CallIdAllocator::new());

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let allocator = Arc::clone(&allocator);
            let metadata = Arc::clone(&metadata);
            let log = log.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let target = Arc::new(RecordingTarget::new("CartTest", log.clone()));
                    let context: SharedContext =
                        fixtures::test_call(Arc::clone(&metadata), target, "adds_item", vec![None]);
                    let id = allocator.next_id();
                    manager.initialize(id, &context).unwrap();
                    assert!(manager.is_active(id));
                    manager.cleanup(id, &context).unwrap();
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }

    assert!(manager.active_calls().is_empty());
    let events = log.events();
    assert_eq!(events.len(), 8 * 25 * 4);
    for label in ["outer-setup", "inner-setup", "inner-teardown", "outer-teardown"] {
        assert_eq!(events.iter().filter(|e| *e == label).count(), 200);
    }
}

#[test]
fn test_single_call_full_sequence() {
    let log = EventLog::new();
    let mut metadata = fixtures::cart_hierarchy();
    metadata.attach_handler(
        Scope::of_type("CartTest"),
        HandlerDescriptor::new(fixtures::recording_handler_type("H", &log)),
    );
    metadata.attach_handler(
        Scope::method("CartTest", "adds_item"),
        HandlerDescriptor::new(fixtures::recording_handler_type("G", &log)).with_priority(-100),
    );
    let metadata = Arc::new(metadata);
    let manager = LifecycleManager::standard(Arc::clone(&metadata));
    let target = Arc::new(RecordingTarget::new("CartTest", log.clone()));
    let context = fixtures::test_call(metadata, target, "adds_item", vec![None]);
    let id = CallIdAllocator::new().next_id();

    manager.initialize(id, &context).unwrap();
    log.record("body");
    manager.cleanup(id, &context).unwrap();

    assert_eq!(
        log.events(),
        ["G-setup", "H-setup", "body", "H-teardown", "G-teardown"]
    );
}
