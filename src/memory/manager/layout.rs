/*!
 * Block Layout
 *
 * Offset arithmetic for one raw block, low to high address:
 *
 * ```text
 * [size header][leading guard][payload: n * size_of::<T>()][trailing guard]
 * ^ base                       ^ payload (returned to caller)
 * ```
 *
 * The header holds the payload byte size in native byte order and is written
 * before the guards are stamped.
 */

use crate::core::limits::HEADER_SIZE;
use crate::core::types::{Address, Size};
use crate::memory::traits::BoundsChecking;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockLayout {
    pub base: Address,
    pub payload: Address,
    pub payload_size: Size,
    pub internal_size: Size,
}

impl BlockLayout {
    /// Header plus both guards
    pub const fn overhead<C: BoundsChecking>() -> Size {
        HEADER_SIZE + 2 * C::GUARD_SIZE
    }

    /// Distance from the start of the raw block to the first payload byte
    pub const fn payload_offset<C: BoundsChecking>() -> Size {
        HEADER_SIZE + C::GUARD_SIZE
    }

    /// Bytes to request from the backing allocator, `None` on overflow
    pub fn internal_size<C: BoundsChecking>(payload_size: Size) -> Option<Size> {
        payload_size.checked_add(Self::overhead::<C>())
    }

    pub fn new<C: BoundsChecking>(base: Address, payload_size: Size) -> Self {
        Self {
            base,
            payload: base + Self::payload_offset::<C>(),
            payload_size,
            internal_size: payload_size + Self::overhead::<C>(),
        }
    }

    /// Recover the raw block start from a payload address
    pub fn base_of<C: BoundsChecking>(payload: Address) -> Option<Address> {
        payload.checked_sub(Self::payload_offset::<C>())
    }

    /// One past the last byte of the raw block
    pub fn end(&self) -> Address {
        self.base + self.internal_size
    }

    /// Start of the guard-stamped region (everything after the header)
    pub fn guarded_start(&self) -> Address {
        self.base + HEADER_SIZE
    }

    pub fn guarded_len(&self) -> Size {
        self.internal_size - HEADER_SIZE
    }
}

pub(crate) fn write_header(memory: &mut [u8], base: Address, payload_size: Size) {
    memory[base..base + HEADER_SIZE].copy_from_slice(&payload_size.to_ne_bytes());
}

pub(crate) fn read_header(memory: &[u8], base: Address) -> Option<Size> {
    let bytes = memory.get(base..base.checked_add(HEADER_SIZE)?)?;
    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(bytes);
    Some(Size::from_ne_bytes(raw))
}
