/*!
 * Corruption Detection Tests
 * Guard and header overwrites, poisoning and abort
 */

use guarded_memory::core::limits::HEADER_SIZE;
use guarded_memory::memory::{
    Array, BoundsChecked, Constructed, CorruptionAction, DefaultBoundsChecking, LinearAllocator,
    MemoryError, Scalar, Trivial, TypedMemoryManager,
};
use pretty_assertions::assert_eq;
use std::cell::Cell;

fn guarded(action: CorruptionAction) -> TypedMemoryManager<LinearAllocator, DefaultBoundsChecking> {
    TypedMemoryManager::builder(LinearAllocator::new(2000))
        .bounds_checking(DefaultBoundsChecking::new())
        .on_corruption(action)
        .build()
}

#[test]
fn test_leading_guard_overwrite_is_fatal() {
    let mut manager = guarded(CorruptionAction::Poison);
    let block = manager.allocate::<i32, Trivial>().unwrap();
    let payload = block.address();

    manager.write_bytes(payload - 1, &[0xFF]).unwrap();
    let err = manager
        .deallocate::<i32, Trivial, Scalar>(block)
        .unwrap_err();

    assert_eq!(err, MemoryError::CorruptionDetected(payload));
    assert!(err.is_fatal());
    assert!(manager.is_poisoned());
    assert_eq!(manager.poisoned_at(), Some(payload));
}

#[test]
fn test_every_guard_byte_is_checked() {
    let positions: Vec<isize> = vec![-4, -3, -2, -1, 8, 9, 10, 11];
    for offset in positions {
        let mut manager = guarded(CorruptionAction::Poison);
        let block = manager.allocate::<u64, Trivial>().unwrap();
        let target = (block.address() as isize + offset) as usize;

        manager.write_bytes(target, &[0x00]).unwrap();
        let result = manager.deallocate::<u64, Trivial, Scalar>(block);

        assert!(
            matches!(result, Err(MemoryError::CorruptionDetected(_))),
            "overwrite at payload{:+} went unnoticed",
            offset
        );
    }
}

#[test]
fn test_trailing_guard_overwrite_in_array() {
    let mut manager = guarded(CorruptionAction::Poison);
    let block = manager.allocate_array::<u16, Trivial>(4).unwrap();

    // One element past the end.
    manager
        .write_bytes(block.address() + block.size_bytes(), &[1, 2])
        .unwrap();

    assert!(manager
        .deallocate::<u16, Trivial, Array>(block)
        .unwrap_err()
        .is_fatal());
}

#[test]
fn test_header_overwrite_is_fatal() {
    let mut manager = guarded(CorruptionAction::Poison);
    let block = manager.allocate::<u32, Trivial>().unwrap();
    let base = block.address() - HEADER_SIZE - 4;

    manager.write_bytes(base, &[0xAA; 2]).unwrap();

    assert!(matches!(
        manager.deallocate::<u32, Trivial, Scalar>(block),
        Err(MemoryError::CorruptionDetected(_))
    ));
}

#[test]
fn test_payload_writes_are_not_corruption() {
    let mut manager = guarded(CorruptionAction::Poison);
    let block = manager.allocate_array::<u8, Trivial>(8).unwrap();

    manager.write_bytes(block.address(), &[0xEF; 8]).unwrap();
    manager.write_bytes(block.address(), &[0x00; 8]).unwrap();

    manager.deallocate::<u8, Trivial, Array>(block).unwrap();
    assert!(!manager.is_poisoned());
}

#[test]
fn test_poisoned_manager_refuses_further_work() {
    let mut manager = guarded(CorruptionAction::Poison);
    let good = manager.allocate::<u32, Trivial>().unwrap();
    let bad = manager.allocate::<u32, Trivial>().unwrap();
    let bad_address = bad.address();

    manager.write_bytes(bad_address + 4, &[0]).unwrap();
    manager.deallocate::<u32, Trivial, Scalar>(bad).unwrap_err();

    assert_eq!(
        manager.allocate::<u32, Trivial>().unwrap_err(),
        MemoryError::Poisoned(bad_address)
    );
    assert_eq!(
        manager.get(&good, 0).unwrap_err(),
        MemoryError::Poisoned(bad_address)
    );
    assert_eq!(
        manager.write_bytes(0, &[0]).unwrap_err(),
        MemoryError::Poisoned(bad_address)
    );
    assert_eq!(
        manager
            .deallocate::<u32, Trivial, Scalar>(good)
            .unwrap_err(),
        MemoryError::Poisoned(bad_address)
    );

    // Inspection still works.
    assert_eq!(manager.read_bytes(bad_address + 4, 1).unwrap(), &[0]);
    assert!(manager.stats().poisoned);
    assert_eq!(manager.live_count(), 2);
}

#[test]
#[should_panic(expected = "Memory corruption detected")]
fn test_abort_action_panics() {
    let mut manager = guarded(CorruptionAction::Abort);
    let block = manager.allocate::<i32, Trivial>().unwrap();

    manager.write_bytes(block.address() - 1, &[0xFF]).unwrap();
    let _ = manager.deallocate::<i32, Trivial, Scalar>(block);
}

thread_local! {
    static NOISY_DROPS: Cell<usize> = const { Cell::new(0) };
}

#[derive(Debug, Default)]
struct Noisy(u32);

impl Drop for Noisy {
    fn drop(&mut self) {
        NOISY_DROPS.with(|d| d.set(d.get() + 1));
    }
}

#[test]
fn test_poisoned_manager_leaks_instead_of_dropping() {
    NOISY_DROPS.with(|d| d.set(0));
    {
        let mut manager = guarded(CorruptionAction::Poison);
        let _noisy = manager.allocate_array::<Noisy, Constructed>(2).unwrap();
        let victim = manager.allocate::<u8, Trivial>().unwrap();

        manager.write_bytes(victim.address() + 1, &[0]).unwrap();
        manager
            .deallocate::<u8, Trivial, Scalar>(victim)
            .unwrap_err();
    }
    assert_eq!(NOISY_DROPS.with(|d| d.get()), 0);
}

#[test]
fn test_wider_guard_and_custom_sentinel() {
    let mut manager = TypedMemoryManager::builder(LinearAllocator::new(256))
        .bounds_checking(BoundsChecked::<8, 0xA5>::new())
        .build();
    let block = manager.allocate::<u32, Trivial>().unwrap();

    assert_eq!(manager.overhead(), HEADER_SIZE + 16);
    assert_eq!(
        manager.read_bytes(block.address() - 8, 8).unwrap(),
        &[0xA5; 8]
    );

    manager.write_bytes(block.address() + 4 + 7, &[0]).unwrap();
    assert!(manager
        .deallocate::<u32, Trivial, Scalar>(block)
        .is_err());
}

#[test]
fn test_without_guards_overruns_go_unnoticed() {
    let mut manager = TypedMemoryManager::new(LinearAllocator::new(64));
    let block = manager.allocate::<u32, Trivial>().unwrap();

    manager.write_bytes(block.address() + 4, &[0xFF; 4]).unwrap();

    manager.deallocate::<u32, Trivial, Scalar>(block).unwrap();
    assert!(!manager.is_poisoned());
}
