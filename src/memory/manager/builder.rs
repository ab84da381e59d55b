/*!
 * Manager Builder
 * Fluent construction of a `TypedMemoryManager` with chosen policies
 */

use super::TypedMemoryManager;
use crate::memory::bounds::NoBoundsChecking;
use crate::memory::traits::{BackingAllocator, BoundsChecking, MemoryTracking};
use crate::memory::tracking::NoTracking;
use crate::memory::types::CorruptionAction;

/// Builder for `TypedMemoryManager`
///
/// # Example
///
/// ```rust
/// use guarded_memory::memory::{
///     DefaultBoundsChecking, JournalTracking, LinearAllocator, TypedMemoryManager,
/// };
///
/// let manager = TypedMemoryManager::builder(LinearAllocator::new(2000))
///     .bounds_checking(DefaultBoundsChecking::new())
///     .tracking(JournalTracking::unbounded())
///     .build();
/// assert_eq!(manager.capacity(), 2000);
/// ```
#[derive(Debug)]
pub struct ManagerBuilder<B, C = NoBoundsChecking, K = NoTracking> {
    backing: B,
    bounds: C,
    tracking: K,
    on_corruption: CorruptionAction,
}

impl<B: BackingAllocator> ManagerBuilder<B, NoBoundsChecking, NoTracking> {
    pub fn new(backing: B) -> Self {
        Self {
            backing,
            bounds: NoBoundsChecking,
            tracking: NoTracking,
            on_corruption: CorruptionAction::default(),
        }
    }
}

impl<B, C, K> ManagerBuilder<B, C, K>
where
    B: BackingAllocator,
    C: BoundsChecking,
    K: MemoryTracking,
{
    /// Use `bounds` for guard regions
    pub fn bounds_checking<C2: BoundsChecking>(self, bounds: C2) -> ManagerBuilder<B, C2, K> {
        ManagerBuilder {
            backing: self.backing,
            bounds,
            tracking: self.tracking,
            on_corruption: self.on_corruption,
        }
    }

    /// Report allocations to `tracking`
    pub fn tracking<K2: MemoryTracking>(self, tracking: K2) -> ManagerBuilder<B, C, K2> {
        ManagerBuilder {
            backing: self.backing,
            bounds: self.bounds,
            tracking,
            on_corruption: self.on_corruption,
        }
    }

    /// Choose what happens when corruption is detected
    pub fn on_corruption(mut self, action: CorruptionAction) -> Self {
        self.on_corruption = action;
        self
    }

    pub fn build(self) -> TypedMemoryManager<B, C, K> {
        TypedMemoryManager::assemble(self.backing, self.bounds, self.tracking, self.on_corruption)
    }
}
