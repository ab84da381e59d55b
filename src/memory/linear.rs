/*!
 * Linear Allocator
 *
 * Bump-pointer allocator over one fixed-size buffer.
 *
 * ## Performance
 *
 * - **Allocation**: O(1), just bumps an offset
 * - **Free**: O(1) bookkeeping, the bytes are never reclaimed or reused
 * - No fragmentation bookkeeping at all
 */

use super::traits::BackingAllocator;
use super::types::{AllocatorStats, MemoryError, MemoryResult};
use crate::core::limits::DEFAULT_ARENA_CAPACITY;
use crate::core::types::{Address, Size};
use tracing::{debug, warn};

/// Bump allocator handing out monotonically increasing offsets
#[derive(Debug)]
pub struct LinearAllocator {
    buffer: Box<[u8]>,
    offset: usize,
    peak: usize,
    allocation_count: usize,
    free_count: usize,
    failed_count: usize,
}

impl LinearAllocator {
    /// Create an allocator owning a zeroed buffer of `capacity` bytes
    pub fn new(capacity: Size) -> Self {
        debug!(capacity, "Linear allocator initialized");
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
            peak: 0,
            allocation_count: 0,
            free_count: 0,
            failed_count: 0,
        }
    }

    /// Offset the next allocation will start at
    pub fn cursor(&self) -> Address {
        self.offset
    }
}

impl Default for LinearAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_CAPACITY)
    }
}

impl BackingAllocator for LinearAllocator {
    fn allocate(&mut self, size: Size) -> MemoryResult<Address> {
        let available = self.buffer.len() - self.offset;
        if size > available {
            self.failed_count += 1;
            warn!(
                requested = size,
                available,
                total = self.buffer.len(),
                "Linear allocator exhausted"
            );
            return Err(MemoryError::OutOfMemory {
                requested: size,
                available,
                used: self.offset,
                total: self.buffer.len(),
            });
        }

        let address = self.offset;
        self.offset += size;
        self.peak = self.peak.max(self.offset);
        self.allocation_count += 1;
        Ok(address)
    }

    fn free(&mut self, address: Address) {
        // Marker only: the bump pointer never moves backwards.
        self.free_count += 1;
        debug!(address, "Linear allocator free recorded");
    }

    fn capacity(&self) -> Size {
        self.buffer.len()
    }

    fn used(&self) -> Size {
        self.offset
    }

    fn memory(&self) -> &[u8] {
        &self.buffer
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            capacity: self.buffer.len(),
            used: self.offset,
            peak: self.peak,
            allocation_count: self.allocation_count,
            free_count: self.free_count,
            failed_count: self.failed_count,
        }
    }
}
