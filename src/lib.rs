/*!
 * Guarded Memory Library
 * Policy-composable typed memory manager with guard-byte overrun detection
 */

pub mod core;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use crate::core::SessionConfig;
pub use memory::{
    Array, Block, BoundsChecked, Constructed, DefaultBoundsChecking, LinearAllocator,
    MemoryError, MemoryResult, NoBoundsChecking, Scalar, Trivial, TypedMemoryManager,
};
pub use monitoring::{init_tracing, LogDispatcher, LogLevel};
