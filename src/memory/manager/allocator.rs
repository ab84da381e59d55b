/*!
 * Typed Allocation and Release
 * Header/guard layout, construction and destruction around the backing allocator
 */

use super::layout::{read_header, write_header, BlockLayout};
use super::{Block, LiveBlock, TypedMemoryManager};
use crate::core::limits::SCRUB_BYTE;
use crate::core::types::{Address, Size};
use crate::memory::lifecycle::{Arity, Lifecycle, Trivial};
use crate::memory::traits::{BackingAllocator, BoundsChecking, MemoryTracking};
use crate::memory::types::{
    AllocationEvent, AllocationRecord, CorruptionAction, MemoryError, MemoryPressure, MemoryResult,
};
use std::mem;
use std::panic::Location;
use tracing::{debug, error, warn};

impl<B, C, K> TypedMemoryManager<B, C, K>
where
    B: BackingAllocator,
    C: BoundsChecking,
    K: MemoryTracking,
{
    /// Allocate a single element; same as `allocate_array::<T, L>(1)`
    #[track_caller]
    pub fn allocate<T: 'static, L: Lifecycle<T>>(&mut self) -> MemoryResult<Block<T>> {
        self.allocate_array::<T, L>(1)
    }

    /// Allocate `count` contiguous elements of `T`
    ///
    /// `Constructed` elements are default-built in ascending index order;
    /// `Trivial` payloads are left as whatever bytes the buffer held.
    /// Exhaustion of the backing allocator is returned unchanged.
    #[track_caller]
    pub fn allocate_array<T: 'static, L: Lifecycle<T>>(
        &mut self,
        count: usize,
    ) -> MemoryResult<Block<T>> {
        let location = Location::caller();
        self.ensure_healthy()?;
        if count == 0 {
            return Err(MemoryError::InvalidCount(count));
        }

        let element_size = mem::size_of::<T>();
        let overflow = MemoryError::SizeOverflow {
            count,
            element_size,
        };
        let payload_size = count.checked_mul(element_size).ok_or(overflow.clone())?;
        let internal_size = BlockLayout::internal_size::<C>(payload_size).ok_or(overflow)?;

        let base = self.backing.allocate(internal_size).map_err(|e| {
            error!(
                requested = internal_size,
                payload_size,
                type_name = std::any::type_name::<T>(),
                count,
                error = %e,
                "Backing allocator could not satisfy request"
            );
            e
        })?;

        let layout = BlockLayout::new::<C>(base, payload_size);
        if layout.end() > self.backing.memory().len() {
            self.backing.free(base);
            return Err(MemoryError::InvalidAddress(base));
        }

        let memory = self.backing.memory_mut();
        write_header(memory, base, payload_size);
        self.bounds
            .fill(memory, layout.guarded_start(), layout.guarded_len());
        // SAFETY: `layout.end()` is within `memory`, so the payload range
        // `payload..payload + count * size_of::<T>()` is writable.
        unsafe { L::construct(memory.as_mut_ptr().add(layout.payload), count) };

        let drop_fn = if L::TRIVIAL {
            None
        } else {
            Some(<L as Lifecycle<T>>::destruct as unsafe fn(*mut u8, usize))
        };
        self.live.insert(
            layout.payload,
            LiveBlock {
                base,
                count,
                payload_size,
                internal_size,
                type_name: std::any::type_name::<T>(),
                lifecycle: L::NAME,
                drop_fn,
            },
        );
        self.allocation_count += 1;

        self.tracking.record(&AllocationRecord::new(
            AllocationEvent::Allocated,
            base,
            layout.payload,
            payload_size,
            internal_size,
            count,
            std::any::type_name::<T>(),
            location,
        ));
        self.log_allocation(&layout, count);

        Ok(Block::new(layout.payload, count, self.id))
    }

    /// Allocate `size` untyped bytes
    #[track_caller]
    pub fn allocate_bytes(&mut self, size: Size) -> MemoryResult<Block<u8>> {
        self.allocate_array::<u8, Trivial>(size)
    }

    /// Release a block allocated by this manager
    ///
    /// `L` must name the lifecycle used at allocation; `A` states whether the
    /// release covers a scalar or an array. The size header and both guard
    /// regions are verified before any element is dropped. Misuse errors leave
    /// the block live (it is destructed when the manager drops); corruption
    /// poisons the manager or panics, depending on `CorruptionAction`.
    #[track_caller]
    pub fn deallocate<T: 'static, L: Lifecycle<T>, A: Arity>(
        &mut self,
        block: Block<T>,
    ) -> MemoryResult<()> {
        let location = Location::caller();
        self.ensure_healthy()?;
        let live = self.ensure_live(&block)?;
        let payload = block.address;

        if live.lifecycle != L::NAME {
            warn!(
                address = payload,
                allocated = live.lifecycle,
                released = L::NAME,
                "Lifecycle mismatch on release"
            );
            return Err(MemoryError::LifecycleMismatch {
                address: payload,
                allocated: live.lifecycle,
                released: L::NAME,
            });
        }
        if !A::IS_ARRAY && live.count > 1 {
            warn!(address = payload, count = live.count, "Array released as scalar");
            return Err(MemoryError::ArityMismatch {
                address: payload,
                count: live.count,
            });
        }

        let Some(base) = BlockLayout::base_of::<C>(payload) else {
            return Err(MemoryError::InvalidAddress(payload));
        };
        debug_assert_eq!(base, live.base);

        let expected = block.count * mem::size_of::<T>();
        let memory = self.backing.memory();
        let recorded = read_header(memory, base);
        if recorded != Some(expected) {
            error!(
                address = payload,
                expected,
                recorded = ?recorded,
                "Size header overwritten"
            );
            return self.corruption(payload);
        }
        if !self.bounds.check(memory, payload, expected) {
            error!(
                address = payload,
                size = expected,
                guard_size = C::GUARD_SIZE,
                "Guard region overwritten"
            );
            return self.corruption(payload);
        }

        // Forget the block before running destructors so a panicking Drop
        // can never lead to a second destruction at manager drop.
        self.live.remove(&payload);

        if !L::TRIVIAL {
            let memory = self.backing.memory_mut();
            let start = memory.as_mut_ptr().wrapping_add(payload);
            // SAFETY: the block was live with `count` constructed elements
            // and has just been removed from the live table.
            unsafe { L::destruct(start, block.count) };
            // Payload bytes may hold padding left by the destructed values.
            memory[payload..payload + expected].fill(SCRUB_BYTE);
        }

        self.backing.free(base);
        self.free_count += 1;

        self.tracking.record(&AllocationRecord::new(
            AllocationEvent::Freed,
            base,
            payload,
            expected,
            live.internal_size,
            block.count,
            live.type_name,
            location,
        ));
        debug!(
            address = base,
            payload,
            size = expected,
            internal_size = live.internal_size,
            arity = A::NAME,
            "Deallocated block"
        );
        Ok(())
    }

    /// Release an untyped block from `allocate_bytes`
    #[track_caller]
    pub fn deallocate_bytes<A: Arity>(&mut self, block: Block<u8>) -> MemoryResult<()> {
        self.deallocate::<u8, Trivial, A>(block)
    }

    fn corruption(&mut self, payload: Address) -> MemoryResult<()> {
        self.poisoned = Some(payload);
        let err = MemoryError::CorruptionDetected(payload);
        match self.on_corruption {
            CorruptionAction::Poison => Err(err),
            CorruptionAction::Abort => panic!("{}", err),
        }
    }

    fn log_allocation(&self, layout: &BlockLayout, count: usize) {
        let total = self.backing.capacity();
        let used = self.backing.used();
        let pressure = if total == 0 {
            MemoryPressure::Critical
        } else {
            MemoryPressure::from_ratio(used as f64 / total as f64)
        };

        match pressure {
            MemoryPressure::High | MemoryPressure::Critical => warn!(
                address = layout.base,
                payload = layout.payload,
                size = layout.payload_size,
                internal_size = layout.internal_size,
                count,
                used,
                total,
                pressure = %pressure,
                "Allocated block under memory pressure"
            ),
            _ => debug!(
                address = layout.base,
                payload = layout.payload,
                size = layout.payload_size,
                internal_size = layout.internal_size,
                count,
                "Allocated block"
            ),
        }
    }
}
