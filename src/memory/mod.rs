/*!
 * Memory Module
 * Typed allocation over a pluggable backing allocator with guard regions
 */

pub mod bounds;
pub mod lifecycle;
pub mod linear;
pub mod manager;
pub mod plain;
pub mod traits;
pub mod tracking;
pub mod types;

// Re-export for convenience
pub use bounds::{BoundsChecked, DefaultBoundsChecking, NoBoundsChecking};
pub use lifecycle::{Array, Arity, Constructed, Lifecycle, Scalar, Trivial};
pub use linear::LinearAllocator;
pub use manager::{Block, ManagerBuilder, TypedMemoryManager};
pub use plain::Plain;
pub use traits::*;
pub use tracking::{DispatchTracking, JournalTracking, NoTracking, TracingTracking};
pub use types::*;
