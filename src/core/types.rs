/*!
 * Core Types
 * Common types used across the crate
 */

/// Address type for memory operations
///
/// Addresses are byte offsets into the backing allocator's buffer.
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// Log channel identifier
pub type Channel = u32;

/// Identifier handed to every manager instance so blocks can be traced back
/// to the manager that produced them
pub type ManagerId = u64;
