/*!
 * Bounds Checking Policies
 *
 * Guard regions of `WIDTH` sentinel bytes on both sides of a payload.
 * The width is a const parameter so a disabled policy has zero overhead and
 * an invalid width is rejected at compile time.
 */

use super::traits::BoundsChecking;
use crate::core::limits::{DEFAULT_GUARD_WIDTH, DEFAULT_SENTINEL, MIN_GUARD_WIDTH};
use crate::core::types::{Address, Size};

/// No guard regions; every operation is a no-op
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBoundsChecking;

impl BoundsChecking for NoBoundsChecking {
    const GUARD_SIZE: usize = 0;

    #[inline]
    fn fill(&self, _memory: &mut [u8], _start: Address, _len: Size) {}

    #[inline]
    fn check(&self, _memory: &[u8], _payload: Address, _payload_size: Size) -> bool {
        true
    }
}

/// `WIDTH` bytes of `SENTINEL` before and after every payload
///
/// Widths below two bytes do not compile, whether the policy is built with
/// `new()` or only named in a manager type:
///
/// ```compile_fail
/// use guarded_memory::memory::BoundsChecked;
///
/// let _policy = BoundsChecked::<1, 0xEF>::new();
/// ```
///
/// ```compile_fail
/// use guarded_memory::memory::{BoundsChecked, BoundsChecking};
///
/// let _width = <BoundsChecked<0, 0xEF> as BoundsChecking>::GUARD_SIZE;
/// ```
///
/// The only constructor is `new()` (or `Default`):
///
/// ```compile_fail
/// use guarded_memory::memory::BoundsChecked;
///
/// let _policy = BoundsChecked::<4, 0xEF>;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BoundsChecked<const WIDTH: usize, const SENTINEL: u8>(());

/// Four bytes of 0xEF on each side
pub type DefaultBoundsChecking = BoundsChecked<DEFAULT_GUARD_WIDTH, DEFAULT_SENTINEL>;

impl<const WIDTH: usize, const SENTINEL: u8> BoundsChecked<WIDTH, SENTINEL> {
    const VALID_WIDTH: () = assert!(
        WIDTH >= MIN_GUARD_WIDTH,
        "guard width must be at least two bytes"
    );

    /// Sentinel pattern each guard region must match
    pub const PATTERN: [u8; WIDTH] = [SENTINEL; WIDTH];

    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_WIDTH;
        Self(())
    }

    pub const fn width(&self) -> usize {
        WIDTH
    }

    pub const fn sentinel(&self) -> u8 {
        SENTINEL
    }
}

impl<const WIDTH: usize, const SENTINEL: u8> Default for BoundsChecked<WIDTH, SENTINEL> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const WIDTH: usize, const SENTINEL: u8> BoundsChecking for BoundsChecked<WIDTH, SENTINEL> {
    const GUARD_SIZE: usize = {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID_WIDTH;
        WIDTH
    };

    fn fill(&self, memory: &mut [u8], start: Address, len: Size) {
        debug_assert!(len >= 2 * WIDTH, "block too small for two guards");
        let end = start + len;
        memory[start..start + WIDTH].fill(SENTINEL);
        memory[end - WIDTH..end].fill(SENTINEL);
    }

    fn check(&self, memory: &[u8], payload: Address, payload_size: Size) -> bool {
        let Some(front_start) = payload.checked_sub(WIDTH) else {
            return false;
        };
        let back_start = payload + payload_size;

        let front = memory.get(front_start..payload);
        let back = memory.get(back_start..back_start + WIDTH);

        match (front, back) {
            (Some(front), Some(back)) => {
                front == &Self::PATTERN[..] && back == &Self::PATTERN[..]
            }
            _ => false,
        }
    }
}
