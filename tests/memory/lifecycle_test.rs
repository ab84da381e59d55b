/*!
 * Lifecycle Tests
 * Construction and destruction order, element access and teardown
 */

use guarded_memory::memory::{
    Array, Constructed, DefaultBoundsChecking, LinearAllocator, MemoryError, Scalar, Trivial,
    TypedMemoryManager,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::cell::{Cell, RefCell};
use std::mem;
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    static EVENTS: RefCell<Vec<Event>> = const { RefCell::new(Vec::new()) };
    static NEXT_ID: RefCell<usize> = const { RefCell::new(0) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Built(usize),
    Dropped(usize),
}

fn reset() {
    EVENTS.with(|e| e.borrow_mut().clear());
    NEXT_ID.with(|n| *n.borrow_mut() = 0);
}

fn events() -> Vec<Event> {
    EVENTS.with(|e| e.borrow().clone())
}

#[derive(Debug)]
struct Tracked {
    id: usize,
    value: u64,
}

impl Default for Tracked {
    fn default() -> Self {
        let id = NEXT_ID.with(|n| {
            let mut n = n.borrow_mut();
            let id = *n;
            *n += 1;
            id
        });
        EVENTS.with(|e| e.borrow_mut().push(Event::Built(id)));
        Self { id, value: 0 }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        EVENTS.with(|e| e.borrow_mut().push(Event::Dropped(self.id)));
    }
}

fn guarded() -> TypedMemoryManager<LinearAllocator, DefaultBoundsChecking> {
    TypedMemoryManager::builder(LinearAllocator::new(2000))
        .bounds_checking(DefaultBoundsChecking::new())
        .build()
}

#[test]
fn test_array_built_ascending_dropped_descending() {
    reset();
    let mut manager = guarded();

    let block = manager.allocate_array::<Tracked, Constructed>(4).unwrap();
    assert_eq!(
        events(),
        vec![
            Event::Built(0),
            Event::Built(1),
            Event::Built(2),
            Event::Built(3)
        ]
    );

    manager
        .deallocate::<Tracked, Constructed, Array>(block)
        .unwrap();
    assert_eq!(
        &events()[4..],
        &[
            Event::Dropped(3),
            Event::Dropped(2),
            Event::Dropped(1),
            Event::Dropped(0)
        ]
    );
}

#[test]
fn test_scalar_built_and_dropped_once() {
    reset();
    let mut manager = guarded();

    let block = manager.allocate::<Tracked, Constructed>().unwrap();
    manager
        .deallocate::<Tracked, Constructed, Scalar>(block)
        .unwrap();

    assert_eq!(events(), vec![Event::Built(0), Event::Dropped(0)]);
}

#[test]
fn test_element_access_does_not_drop() {
    reset();
    let mut manager = guarded();
    let block = manager.allocate_array::<Tracked, Constructed>(2).unwrap();

    let doubled = manager
        .with_element(&block, 1, |t| {
            t.value = 21;
            t.value * 2
        })
        .unwrap();
    assert_eq!(doubled, 42);
    assert_eq!(manager.with_element(&block, 1, |t| t.value).unwrap(), 42 / 2);
    assert_eq!(events().len(), 2);

    assert_eq!(
        manager.with_element(&block, 2, |t| t.value).unwrap_err(),
        MemoryError::IndexOutOfBounds { index: 2, count: 2 }
    );

    manager
        .deallocate::<Tracked, Constructed, Array>(block)
        .unwrap();
    assert_eq!(events().len(), 4);
}

#[test]
fn test_strings_can_be_stored() {
    let mut manager = guarded();
    let block = manager.allocate_array::<String, Constructed>(3).unwrap();

    assert_eq!(manager.get(&block, 0).unwrap(), "");
    manager.set(&block, 0, "hello".to_string()).unwrap();
    manager.set(&block, 2, "world".to_string()).unwrap();
    manager
        .with_element(&block, 2, |s| s.push('!'))
        .unwrap();

    assert_eq!(manager.get(&block, 0).unwrap(), "hello");
    assert_eq!(manager.get(&block, 1).unwrap(), "");
    assert_eq!(manager.get(&block, 2).unwrap(), "world!");

    manager
        .deallocate::<String, Constructed, Array>(block)
        .unwrap();
}

#[test]
fn test_payload_scrubbed_after_destruction() {
    let mut manager = guarded();
    let block = manager.allocate_array::<String, Constructed>(2).unwrap();
    manager.set(&block, 0, "scrub me".to_string()).unwrap();
    let payload = block.address();
    let size = block.size_bytes();

    manager
        .deallocate::<String, Constructed, Array>(block)
        .unwrap();

    let bytes = manager.read_bytes(payload, size).unwrap();
    assert!(bytes.iter().all(|&b| b == 0));
}

#[test]
fn test_constructed_payload_is_protected_from_byte_access() {
    let mut manager = guarded();
    let block = manager.allocate::<String, Constructed>().unwrap();
    let payload = block.address();

    assert!(matches!(
        manager.read_bytes(payload, 1),
        Err(MemoryError::ProtectionViolation(_))
    ));
    assert!(matches!(
        manager.write_bytes(payload + 2, &[0; 4]),
        Err(MemoryError::ProtectionViolation(_))
    ));
    // Guards around a constructed payload stay reachable.
    assert_eq!(manager.read_bytes(payload - 4, 4).unwrap(), &[0xEF; 4]);

    manager
        .deallocate::<String, Constructed, Scalar>(block)
        .unwrap();
}

#[test]
fn test_plain_data_may_be_constructed() {
    let mut manager = guarded();
    let block = manager.allocate_array::<u32, Constructed>(3).unwrap();

    assert_eq!(manager.read_slice(&block).unwrap(), vec![0, 0, 0]);
    manager.deallocate::<u32, Constructed, Array>(block).unwrap();
}

#[test]
fn test_manager_drop_destructs_live_blocks() {
    reset();
    {
        let mut manager = guarded();
        let _kept = manager.allocate_array::<Tracked, Constructed>(3).unwrap();
        let _plain = manager.allocate::<u64, Trivial>().unwrap();
        assert_eq!(events().len(), 3);
    }

    let dropped: Vec<_> = events()
        .into_iter()
        .filter(|e| matches!(e, Event::Dropped(_)))
        .collect();
    assert_eq!(
        dropped,
        vec![Event::Dropped(2), Event::Dropped(1), Event::Dropped(0)]
    );
}

proptest! {
    #[test]
    fn every_element_built_and_dropped_exactly_once(n in 1usize..64) {
        reset();
        let mut manager = guarded();

        let block = manager.allocate_array::<Tracked, Constructed>(n).unwrap();
        prop_assert_eq!(
            manager.recorded_size(&block).unwrap(),
            n * mem::size_of::<Tracked>()
        );
        let built: Vec<Event> = (0..n).map(Event::Built).collect();
        prop_assert_eq!(events(), built);

        manager.with_element(&block, n - 1, |t| t.value = n as u64).unwrap();
        prop_assert_eq!(manager.with_element(&block, n - 1, |t| t.value).unwrap(), n as u64);
        prop_assert_eq!(manager.with_element(&block, 0, |t| t.id).unwrap(), 0);

        manager
            .deallocate::<Tracked, Constructed, Array>(block)
            .unwrap();
        let dropped: Vec<Event> = (0..n).rev().map(Event::Dropped).collect();
        let all = events();
        prop_assert_eq!(all.len(), 2 * n);
        prop_assert_eq!(&all[n..], &dropped[..]);

        drop(manager);
        prop_assert_eq!(events().len(), 2 * n);
    }
}

thread_local! {
    static BRITTLE_BUILT: Cell<usize> = const { Cell::new(0) };
    static BRITTLE_DROPPED: Cell<usize> = const { Cell::new(0) };
}

struct Brittle;

impl Default for Brittle {
    fn default() -> Self {
        let built = BRITTLE_BUILT.with(|b| {
            b.set(b.get() + 1);
            b.get()
        });
        if built == 3 {
            panic!("third element refuses to build");
        }
        Brittle
    }
}

impl Drop for Brittle {
    fn drop(&mut self) {
        BRITTLE_DROPPED.with(|d| d.set(d.get() + 1));
    }
}

#[test]
fn test_failed_construction_rolls_back_and_leaves_nothing_live() {
    BRITTLE_BUILT.with(|b| b.set(0));
    BRITTLE_DROPPED.with(|d| d.set(0));
    let mut manager = guarded();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        manager
            .allocate_array::<Brittle, Constructed>(5)
            .map(|block| block.address())
    }));

    assert!(result.is_err());
    assert_eq!(BRITTLE_BUILT.with(|b| b.get()), 3);
    assert_eq!(BRITTLE_DROPPED.with(|d| d.get()), 2);
    assert_eq!(manager.live_count(), 0);
    assert_eq!(manager.stats().allocation_count, 0);
    assert!(!manager.is_poisoned());

    let block = manager.allocate::<u32, Trivial>().unwrap();
    manager.deallocate::<u32, Trivial, Scalar>(block).unwrap();
    drop(manager);
    assert_eq!(BRITTLE_DROPPED.with(|d| d.get()), 2);
}
