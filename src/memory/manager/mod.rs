/*!
 * Typed Memory Manager
 *
 * Allocates typed and untyped blocks from a pluggable backing allocator and
 * composes two further policies around every block:
 *
 * ## Policies
 *
 * - **Bounds checking**: guard regions stamped on allocation and verified on
 *   release; a mismatch is fatal
 * - **Tracking**: every allocation and release is described to an observer
 *   that cannot influence control flow
 *
 * ## Lifecycle
 *
 * Callers state per call whether elements are `Trivial` or `Constructed` and,
 * on release, whether the block is a `Scalar` or an `Array`. Constructed
 * elements are built in ascending index order and dropped in descending
 * order, all of them exactly once.
 *
 * ## Safety upgrades
 *
 * Misuse the layout alone cannot catch (foreign blocks, mismatched lifecycle
 * or arity tags) is detected through a table of live blocks and reported as
 * an error. Blocks still live when the manager drops are destructed then.
 *
 * The manager is single-threaded: it is neither `Send` nor `Sync`.
 */

mod access;
mod allocator;
mod builder;
pub(crate) mod layout;

pub use builder::ManagerBuilder;

use super::bounds::NoBoundsChecking;
use super::traits::{BackingAllocator, BoundsChecking, MemoryTracking};
use super::tracking::NoTracking;
use super::types::{
    AllocatorStats, CorruptionAction, LiveBlockInfo, MemoryError, MemoryResult, MemoryStats,
};
use crate::core::types::{Address, ManagerId, Size};
use ahash::RandomState;
use layout::{read_header, BlockLayout};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to `count` elements of `T` living in a manager's backing memory
///
/// Not `Clone`: releasing a block consumes its handle, so a block cannot be
/// released twice.
#[must_use = "a dropped Block stays allocated until its manager is dropped"]
#[derive(Debug, PartialEq, Eq)]
pub struct Block<T> {
    address: Address,
    count: usize,
    owner: ManagerId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Block<T> {
    fn new(address: Address, count: usize, owner: ManagerId) -> Self {
        Self {
            address,
            count,
            owner,
            _marker: PhantomData,
        }
    }

    /// Address of the first payload byte
    pub fn address(&self) -> Address {
        self.address
    }

    /// Number of elements
    pub fn count(&self) -> usize {
        self.count
    }

    /// Payload size in bytes
    pub fn size_bytes(&self) -> Size {
        self.count * mem::size_of::<T>()
    }

    /// Id of the manager that allocated this block
    pub fn owner(&self) -> ManagerId {
        self.owner
    }
}

/// Bookkeeping for a block that has not been released
#[derive(Debug, Clone, Copy)]
pub(crate) struct LiveBlock {
    pub base: Address,
    pub count: usize,
    pub payload_size: Size,
    pub internal_size: Size,
    pub type_name: &'static str,
    pub lifecycle: &'static str,
    /// Present for constructed blocks; drops `count` elements at a payload pointer
    pub drop_fn: Option<unsafe fn(*mut u8, usize)>,
}

impl LiveBlock {
    pub fn is_trivial(&self) -> bool {
        self.drop_fn.is_none()
    }
}

/// Typed allocator composed from a backing allocator, a bounds-checking
/// policy and a tracking policy
pub struct TypedMemoryManager<B, C = NoBoundsChecking, K = NoTracking>
where
    B: BackingAllocator,
    C: BoundsChecking,
    K: MemoryTracking,
{
    pub(super) id: ManagerId,
    pub(super) backing: B,
    pub(super) bounds: C,
    pub(super) tracking: K,
    // Keyed by payload address
    pub(super) live: HashMap<Address, LiveBlock, RandomState>,
    pub(super) on_corruption: CorruptionAction,
    pub(super) poisoned: Option<Address>,
    pub(super) allocation_count: usize,
    pub(super) free_count: usize,
    _single_threaded: PhantomData<*const ()>,
}

impl<B: BackingAllocator> TypedMemoryManager<B> {
    /// Manager without guard regions or tracking
    pub fn new(backing: B) -> Self {
        Self::with_policies(backing, NoBoundsChecking, NoTracking)
    }

    /// Start configuring a manager over `backing`
    pub fn builder(backing: B) -> ManagerBuilder<B, NoBoundsChecking, NoTracking> {
        ManagerBuilder::new(backing)
    }
}

impl<B, C, K> TypedMemoryManager<B, C, K>
where
    B: BackingAllocator,
    C: BoundsChecking,
    K: MemoryTracking,
{
    /// Manager with explicit policy instances
    pub fn with_policies(backing: B, bounds: C, tracking: K) -> Self {
        Self::assemble(backing, bounds, tracking, CorruptionAction::default())
    }

    pub(super) fn assemble(
        backing: B,
        bounds: C,
        tracking: K,
        on_corruption: CorruptionAction,
    ) -> Self {
        let id = NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            manager = id,
            capacity = backing.capacity(),
            guard_size = C::GUARD_SIZE,
            on_corruption = ?on_corruption,
            "Typed memory manager initialized"
        );
        Self {
            id,
            backing,
            bounds,
            tracking,
            live: HashMap::with_hasher(RandomState::new()),
            on_corruption,
            poisoned: None,
            allocation_count: 0,
            free_count: 0,
            _single_threaded: PhantomData,
        }
    }

    pub fn id(&self) -> ManagerId {
        self.id
    }

    /// Bytes added around every payload (header and both guards)
    pub fn overhead(&self) -> Size {
        BlockLayout::overhead::<C>()
    }

    pub fn bounds(&self) -> &C {
        &self.bounds
    }

    pub fn tracking(&self) -> &K {
        &self.tracking
    }

    pub fn tracking_mut(&mut self) -> &mut K {
        &mut self.tracking
    }

    pub fn on_corruption(&self) -> CorruptionAction {
        self.on_corruption
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Payload address at which corruption was detected, if any
    pub fn poisoned_at(&self) -> Option<Address> {
        self.poisoned
    }

    pub fn capacity(&self) -> Size {
        self.backing.capacity()
    }

    pub fn available(&self) -> Size {
        self.backing.available()
    }

    pub fn backing_stats(&self) -> AllocatorStats {
        self.backing.stats()
    }

    /// Whether `address` is the payload address of a live block
    pub fn is_live(&self, address: Address) -> bool {
        self.live.contains_key(&address)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live blocks ordered by address
    pub fn live_blocks(&self) -> Vec<LiveBlockInfo> {
        let mut blocks: Vec<_> = self
            .live
            .iter()
            .map(|(&payload, block)| LiveBlockInfo {
                address: block.base,
                payload,
                count: block.count,
                payload_size: block.payload_size,
                internal_size: block.internal_size,
                type_name: block.type_name,
                lifecycle: block.lifecycle,
            })
            .collect();
        blocks.sort_by_key(|b| b.address);
        blocks
    }

    /// Payload size stored in the block's header
    pub fn recorded_size<T>(&self, block: &Block<T>) -> MemoryResult<Size> {
        self.ensure_live(block)?;
        let base = BlockLayout::base_of::<C>(block.address)
            .ok_or(MemoryError::InvalidAddress(block.address))?;
        read_header(self.backing.memory(), base).ok_or(MemoryError::InvalidAddress(base))
    }

    /// Overall memory statistics
    pub fn stats(&self) -> MemoryStats {
        let total = self.backing.capacity();
        let used = self.backing.used();
        let usage_percentage = if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64) * 100.0
        };
        MemoryStats {
            total_memory: total,
            used_memory: used,
            available_memory: self.backing.available(),
            usage_percentage,
            live_blocks: self.live.len(),
            live_payload_bytes: self.live.values().map(|b| b.payload_size).sum(),
            allocation_count: self.allocation_count,
            free_count: self.free_count,
            poisoned: self.poisoned.is_some(),
        }
    }

    pub(super) fn ensure_healthy(&self) -> MemoryResult<()> {
        match self.poisoned {
            Some(address) => Err(MemoryError::Poisoned(address)),
            None => Ok(()),
        }
    }

    /// Check ownership and liveness of a block handle
    pub(super) fn ensure_live<T>(&self, block: &Block<T>) -> MemoryResult<LiveBlock> {
        if block.owner != self.id {
            warn!(
                address = block.address,
                owner = block.owner,
                manager = self.id,
                "Block belongs to another manager"
            );
            return Err(MemoryError::ForeignBlock {
                address: block.address,
                owner: block.owner,
                manager: self.id,
            });
        }
        self.live.get(&block.address).copied().ok_or_else(|| {
            warn!(address = block.address, "Block is not live");
            MemoryError::InvalidAddress(block.address)
        })
    }
}

impl<B, C, K> Drop for TypedMemoryManager<B, C, K>
where
    B: BackingAllocator,
    C: BoundsChecking,
    K: MemoryTracking,
{
    fn drop(&mut self) {
        if self.live.is_empty() {
            return;
        }
        if let Some(address) = self.poisoned {
            // Memory is already corrupt; running destructors could make it worse.
            warn!(
                manager = self.id,
                live = self.live.len(),
                corrupted_at = address,
                "Poisoned manager dropped, leaking live blocks"
            );
            return;
        }

        debug!(
            manager = self.id,
            live = self.live.len(),
            "Manager dropped with live blocks, destructing"
        );
        let live = mem::take(&mut self.live);
        let memory = self.backing.memory_mut();
        for (payload, block) in live {
            if let Some(drop_fn) = block.drop_fn {
                debug_assert!(payload + block.payload_size <= memory.len());
                // SAFETY: the block is live, so its payload holds `count`
                // constructed elements that have not been dropped.
                unsafe { drop_fn(memory.as_mut_ptr().add(payload), block.count) };
            }
        }
    }
}

impl<B, C, K> std::fmt::Debug for TypedMemoryManager<B, C, K>
where
    B: BackingAllocator,
    C: BoundsChecking,
    K: MemoryTracking,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedMemoryManager")
            .field("id", &self.id)
            .field("capacity", &self.backing.capacity())
            .field("used", &self.backing.used())
            .field("guard_size", &C::GUARD_SIZE)
            .field("live", &self.live.len())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
