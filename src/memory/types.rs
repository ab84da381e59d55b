/*!
 * Memory Types
 * Common types for memory management
 */

use crate::core::limits::{PRESSURE_CRITICAL, PRESSURE_HIGH, PRESSURE_MEDIUM};
use crate::core::types::{Address, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::panic::Location;
use std::str::FromStr;
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum MemoryError {
    #[error("Out of memory: requested {requested} bytes, available {available} bytes ({used} used / {total} total)")]
    #[diagnostic(
        code(memory::out_of_memory),
        help("The linear allocator never reclaims freed blocks. Use a larger backing buffer.")
    )]
    OutOfMemory {
        requested: usize,
        available: usize,
        used: usize,
        total: usize,
    },

    #[error("Invalid memory address: 0x{0:x}")]
    #[diagnostic(
        code(memory::invalid_address),
        help("The address is outside the backing buffer or was never handed out by this manager.")
    )]
    InvalidAddress(usize),

    #[error("Memory corruption detected at 0x{0:x}")]
    #[diagnostic(
        code(memory::corruption_detected),
        help("A guard region or size header was overwritten. Memory safety is already violated; shut down.")
    )]
    CorruptionDetected(usize),

    #[error("Memory manager poisoned by corruption at 0x{0:x}")]
    #[diagnostic(
        code(memory::poisoned),
        help("The manager refuses further work after detecting corruption.")
    )]
    Poisoned(usize),

    #[error("Block at 0x{address:x} belongs to manager {owner}, not manager {manager}")]
    #[diagnostic(code(memory::foreign_block))]
    ForeignBlock {
        address: usize,
        owner: u64,
        manager: u64,
    },

    #[error("Lifecycle mismatch at 0x{address:x}: allocated as {allocated}, released as {released}")]
    #[diagnostic(
        code(memory::lifecycle_mismatch),
        help("Release a block with the same Trivial/Constructed strategy it was allocated with.")
    )]
    LifecycleMismatch {
        address: usize,
        allocated: &'static str,
        released: &'static str,
    },

    #[error("Arity mismatch at 0x{address:x}: {count} elements released as a scalar")]
    #[diagnostic(
        code(memory::arity_mismatch),
        help("Release multi-element blocks with the Array tag.")
    )]
    ArityMismatch { address: usize, count: usize },

    #[error("Invalid element count: {0}")]
    #[diagnostic(code(memory::invalid_count), help("Allocations need at least one element."))]
    InvalidCount(usize),

    #[error("Allocation size overflow: {count} elements of {element_size} bytes")]
    #[diagnostic(code(memory::size_overflow))]
    SizeOverflow { count: usize, element_size: usize },

    #[error("Index {index} out of bounds for block of {count} elements")]
    #[diagnostic(code(memory::index_out_of_bounds))]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("Memory protection violation: {0}")]
    #[diagnostic(code(memory::protection_violation))]
    ProtectionViolation(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(memory::invalid_config))]
    InvalidConfig(String),
}

impl MemoryError {
    /// Whether the error means memory safety is already compromised
    ///
    /// Fatal errors may be logged but normal operation must not resume.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MemoryError::CorruptionDetected(_) | MemoryError::Poisoned(_)
        )
    }
}

/// What a manager does when a guard or header check fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionAction {
    /// Return `CorruptionDetected` and refuse all further work
    #[default]
    Poison,
    /// Panic on the spot
    Abort,
}

impl FromStr for CorruptionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "poison" => Ok(CorruptionAction::Poison),
            "abort" | "panic" => Ok(CorruptionAction::Abort),
            other => Err(format!("unknown corruption action '{}'", other)),
        }
    }
}

/// Kind of event carried by an allocation record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationEvent {
    Allocated,
    Freed,
}

impl std::fmt::Display for AllocationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AllocationEvent::Allocated => write!(f, "ALLOC"),
            AllocationEvent::Freed => write!(f, "FREE"),
        }
    }
}

/// Description of one allocate/deallocate call, handed to the tracking policy
///
/// Records are built per call and borrowed by the tracker; they do not
/// outlive the call unless a tracker copies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationRecord {
    pub event: AllocationEvent,
    /// Start of the raw block (header included)
    pub address: Address,
    /// First payload byte as seen by the caller
    pub payload: Address,
    /// Payload bytes requested by the caller
    pub requested_size: Size,
    /// Bytes taken from the backing allocator (header and guards included)
    pub internal_size: Size,
    pub count: usize,
    pub type_name: &'static str,
    pub file: &'static str,
    pub line: u32,
}

impl AllocationRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        event: AllocationEvent,
        address: Address,
        payload: Address,
        requested_size: Size,
        internal_size: Size,
        count: usize,
        type_name: &'static str,
        location: &'static Location<'static>,
    ) -> Self {
        Self {
            event,
            address,
            payload,
            requested_size,
            internal_size,
            count,
            type_name,
            file: location.file(),
            line: location.line(),
        }
    }

    /// One past the last byte of the raw block
    pub fn end(&self) -> Address {
        self.address + self.internal_size
    }
}

impl std::fmt::Display for AllocationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} start=0x{:x} end=0x{:x} size={} internal={} type={}x{} at {}:{}",
            self.event,
            self.address,
            self.end(),
            self.requested_size,
            self.internal_size,
            self.type_name,
            self.count,
            self.file,
            self.line
        )
    }
}

/// Counters kept by a backing allocator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorStats {
    pub capacity: Size,
    pub used: Size,
    pub peak: Size,
    pub allocation_count: usize,
    pub free_count: usize,
    pub failed_count: usize,
}

/// Memory statistics for a typed manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_memory: usize,
    pub used_memory: usize,
    pub available_memory: usize,
    pub usage_percentage: f64,
    pub live_blocks: usize,
    pub live_payload_bytes: usize,
    pub allocation_count: usize,
    pub free_count: usize,
    pub poisoned: bool,
}

impl MemoryStats {
    pub fn memory_pressure(&self) -> MemoryPressure {
        MemoryPressure::from_ratio(self.usage_percentage / 100.0)
    }
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= PRESSURE_CRITICAL {
            MemoryPressure::Critical
        } else if ratio >= PRESSURE_HIGH {
            MemoryPressure::High
        } else if ratio >= PRESSURE_MEDIUM {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

impl std::fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Snapshot of a block that has been allocated and not yet released
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveBlockInfo {
    pub address: Address,
    pub payload: Address,
    pub count: usize,
    pub payload_size: Size,
    pub internal_size: Size,
    pub type_name: &'static str,
    pub lifecycle: &'static str,
}
