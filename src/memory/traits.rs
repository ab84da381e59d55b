/*!
 * Memory Traits
 * Policy abstractions composed by the typed memory manager
 */

use super::types::*;
use crate::core::types::{Address, Size};

/// Provider of raw, untyped memory ranges
///
/// Addresses are offsets into the single contiguous buffer returned by
/// [`BackingAllocator::memory`].
pub trait BackingAllocator {
    /// Reserve `size` bytes
    ///
    /// On failure the allocator state must be left untouched.
    fn allocate(&mut self, size: Size) -> MemoryResult<Address>;

    /// Hand a block back
    ///
    /// Bookkeeping only: callers must not assume the bytes become reusable.
    fn free(&mut self, address: Address);

    /// Total bytes managed
    fn capacity(&self) -> Size;

    /// Bytes currently handed out
    fn used(&self) -> Size;

    /// Bytes still available for allocation
    fn available(&self) -> Size {
        self.capacity().saturating_sub(self.used())
    }

    /// The whole backing buffer
    fn memory(&self) -> &[u8];

    /// The whole backing buffer, mutably
    fn memory_mut(&mut self) -> &mut [u8];

    /// Allocation counters
    fn stats(&self) -> AllocatorStats;
}

/// Guard-region policy
///
/// The interface is uniform whether checking is active or not, so callers
/// switch policies without code changes.
pub trait BoundsChecking {
    /// Width of each guard region in bytes (0 disables checking)
    const GUARD_SIZE: usize;

    /// Stamp the first and last `GUARD_SIZE` bytes of `memory[start..start + len]`
    fn fill(&self, memory: &mut [u8], start: Address, len: Size);

    /// Verify the guards surrounding `memory[payload..payload + payload_size]`
    ///
    /// Returns `false` if either guard differs from the sentinel pattern or
    /// lies outside `memory`.
    fn check(&self, memory: &[u8], payload: Address, payload_size: Size) -> bool;
}

/// Allocation observer
///
/// Tracking never influences control flow: `record` cannot fail, and sinks
/// absorb their own errors.
pub trait MemoryTracking {
    fn record(&mut self, record: &AllocationRecord);
}

impl<K: MemoryTracking + ?Sized> MemoryTracking for &mut K {
    fn record(&mut self, record: &AllocationRecord) {
        (**self).record(record)
    }
}

impl<K: MemoryTracking + ?Sized> MemoryTracking for Box<K> {
    fn record(&mut self, record: &AllocationRecord) {
        (**self).record(record)
    }
}
