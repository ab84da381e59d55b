/*!
 * Misuse Tests
 * Wrong manager, wrong lifecycle, wrong arity; all reported, none fatal
 */

use guarded_memory::memory::{
    Array, Constructed, DefaultBoundsChecking, LinearAllocator, MemoryError, Scalar, Trivial,
    TypedMemoryManager,
};
use pretty_assertions::assert_eq;

fn guarded() -> TypedMemoryManager<LinearAllocator, DefaultBoundsChecking> {
    TypedMemoryManager::builder(LinearAllocator::new(2000))
        .bounds_checking(DefaultBoundsChecking::new())
        .build()
}

#[test]
fn test_foreign_block_is_rejected() {
    let mut owner = guarded();
    let mut other = guarded();
    let block = owner.allocate::<u32, Trivial>().unwrap();
    let address = block.address();
    assert_eq!(block.owner(), owner.id());

    let err = other
        .deallocate::<u32, Trivial, Scalar>(block)
        .unwrap_err();

    assert_eq!(
        err,
        MemoryError::ForeignBlock {
            address,
            owner: owner.id(),
            manager: other.id(),
        }
    );
    assert!(!err.is_fatal());
    assert!(owner.is_live(address));
    assert!(!other.is_poisoned());
}

#[test]
fn test_foreign_block_access_is_rejected() {
    let mut owner = guarded();
    let mut other = guarded();
    let block = owner.allocate_array::<u32, Trivial>(2).unwrap();

    assert!(matches!(
        other.get(&block, 0),
        Err(MemoryError::ForeignBlock { .. })
    ));
    assert!(matches!(
        other.write_slice(&block, &[1]),
        Err(MemoryError::ForeignBlock { .. })
    ));
    assert!(matches!(
        other.recorded_size(&block),
        Err(MemoryError::ForeignBlock { .. })
    ));

    owner.deallocate::<u32, Trivial, Array>(block).unwrap();
}

#[test]
fn test_lifecycle_mismatch_keeps_block_live() {
    let mut manager = guarded();
    let block = manager.allocate::<u64, Constructed>().unwrap();
    let address = block.address();

    let err = manager
        .deallocate::<u64, Trivial, Scalar>(block)
        .unwrap_err();

    assert_eq!(
        err,
        MemoryError::LifecycleMismatch {
            address,
            allocated: "constructed",
            released: "trivial",
        }
    );
    assert!(!err.is_fatal());
    assert!(manager.is_live(address));
    assert_eq!(manager.stats().free_count, 0);
}

#[test]
fn test_array_released_as_scalar() {
    let mut manager = guarded();
    let block = manager.allocate_array::<String, Constructed>(3).unwrap();
    let address = block.address();

    let err = manager
        .deallocate::<String, Constructed, Scalar>(block)
        .unwrap_err();

    assert_eq!(err, MemoryError::ArityMismatch { address, count: 3 });
    assert!(manager.is_live(address));
    assert!(!manager.is_poisoned());
}

#[test]
fn test_single_element_released_as_array() {
    let mut manager = guarded();
    let block = manager.allocate::<i64, Trivial>().unwrap();

    manager.deallocate::<i64, Trivial, Array>(block).unwrap();
    assert_eq!(manager.live_count(), 0);
}

#[test]
fn test_index_out_of_bounds() {
    let mut manager = guarded();
    let block = manager.allocate_array::<u8, Trivial>(4).unwrap();

    assert_eq!(
        manager.get(&block, 4).unwrap_err(),
        MemoryError::IndexOutOfBounds { index: 4, count: 4 }
    );
    assert_eq!(
        manager.set(&block, 10, 1).unwrap_err(),
        MemoryError::IndexOutOfBounds { index: 10, count: 4 }
    );

    manager.deallocate::<u8, Trivial, Array>(block).unwrap();
}
