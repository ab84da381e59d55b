/*!
 * System Limits and Constants
 *
 * Centralized location for layout constants, default sizes and magic numbers.
 * Organized by domain for maintainability and discoverability.
 */

// =============================================================================
// LAYOUT
// =============================================================================

/// Size of the allocation header that records the payload byte size
/// Stored immediately before the leading guard region
pub const HEADER_SIZE: usize = std::mem::size_of::<usize>();

/// Smallest guard width that counts as a meaningful overrun check
pub const MIN_GUARD_WIDTH: usize = 2;

/// Default guard width in bytes for `DefaultBoundsChecking`
pub const DEFAULT_GUARD_WIDTH: usize = 4;

/// Default sentinel byte stamped into guard regions
pub const DEFAULT_SENTINEL: u8 = 0xEF;

/// Byte written over a payload after its values have been destructed
pub const SCRUB_BYTE: u8 = 0x00;

// =============================================================================
// BACKING ALLOCATOR
// =============================================================================

/// Default capacity of the linear backing allocator (bytes)
pub const DEFAULT_ARENA_CAPACITY: usize = 2000;

/// Memory pressure thresholds (fraction of capacity in use)
pub const PRESSURE_MEDIUM: f64 = 0.60;
pub const PRESSURE_HIGH: f64 = 0.80;
pub const PRESSURE_CRITICAL: f64 = 0.95;

// =============================================================================
// DIAGNOSTICS
// =============================================================================

/// Log channel used for allocation records
/// Registered by default on every dispatcher
pub const TRACKING_CHANNEL: u32 = 1;

/// Upper bound for one formatted log line (longer messages are truncated)
pub const LOG_MSG_MAX_SIZE: usize = 255;

/// Maximum number of records kept by `JournalTracking::bounded`
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;
