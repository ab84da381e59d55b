/*!
 * Element and Byte Access
 *
 * Elements are moved out of and back into the backing buffer with unaligned
 * reads and writes at computed offsets; no reference into the buffer is ever
 * handed out for a typed value.
 */

use super::{Block, TypedMemoryManager};
use crate::core::types::{Address, Size};
use crate::memory::plain::Plain;
use crate::memory::traits::{BackingAllocator, BoundsChecking, MemoryTracking};
use crate::memory::types::{MemoryError, MemoryResult};
use std::mem::{self, ManuallyDrop};
use std::ptr;

/// Writes a moved-out element back into its slot, also during unwinding
struct WriteBack<T> {
    slot: *mut T,
    value: ManuallyDrop<T>,
}

impl<T> Drop for WriteBack<T> {
    fn drop(&mut self) {
        // SAFETY: `slot` is the element's location in the backing buffer and
        // `value` was taken from it; it is taken exactly once here.
        unsafe { ptr::write_unaligned(self.slot, ManuallyDrop::take(&mut self.value)) }
    }
}

impl<B, C, K> TypedMemoryManager<B, C, K>
where
    B: BackingAllocator,
    C: BoundsChecking,
    K: MemoryTracking,
{
    fn element_offset<T>(&self, block: &Block<T>, index: usize) -> MemoryResult<Address> {
        self.ensure_healthy()?;
        self.ensure_live(block)?;
        if index >= block.count {
            return Err(MemoryError::IndexOutOfBounds {
                index,
                count: block.count,
            });
        }
        Ok(block.address + index * mem::size_of::<T>())
    }

    /// Clone element `index` out of the block
    pub fn get<T: Clone + 'static>(&self, block: &Block<T>, index: usize) -> MemoryResult<T> {
        let offset = self.element_offset(block, index)?;
        let memory = self.backing.memory();
        // SAFETY: the block is live, so the slot holds a valid `T` (constructed,
        // or plain data valid for any bytes). The bitwise copy is never dropped.
        let value = unsafe {
            ManuallyDrop::new(ptr::read_unaligned(
                memory.as_ptr().add(offset).cast::<T>(),
            ))
        };
        Ok((*value).clone())
    }

    /// Run `f` with mutable access to element `index`
    pub fn with_element<T: 'static, R>(
        &mut self,
        block: &Block<T>,
        index: usize,
        f: impl FnOnce(&mut T) -> R,
    ) -> MemoryResult<R> {
        let offset = self.element_offset(block, index)?;
        let memory = self.backing.memory_mut();
        let slot = memory.as_mut_ptr().wrapping_add(offset).cast::<T>();
        // SAFETY: as in `get`; the guard moves the value back when `f` returns
        // or unwinds, so the slot always ends up holding exactly one value.
        let mut guard = WriteBack {
            slot,
            value: ManuallyDrop::new(unsafe { ptr::read_unaligned(slot) }),
        };
        Ok(f(&mut *guard.value))
    }

    /// Replace element `index`, dropping the previous value
    pub fn set<T: 'static>(
        &mut self,
        block: &Block<T>,
        index: usize,
        value: T,
    ) -> MemoryResult<()> {
        self.with_element(block, index, |slot| *slot = value)
    }

    /// Copy every element out of a plain-data block
    pub fn read_slice<T: Plain>(&self, block: &Block<T>) -> MemoryResult<Vec<T>> {
        self.ensure_healthy()?;
        self.ensure_live(block)?;
        let memory = self.backing.memory();
        let base = memory.as_ptr().wrapping_add(block.address);
        let values = (0..block.count)
            .map(|i| {
                let slot = base.wrapping_add(i * mem::size_of::<T>()).cast::<T>();
                // SAFETY: live block, plain data is valid for any bytes.
                unsafe { ptr::read_unaligned(slot) }
            })
            .collect();
        Ok(values)
    }

    /// Overwrite the first `values.len()` elements of a plain-data block
    pub fn write_slice<T: Plain>(&mut self, block: &Block<T>, values: &[T]) -> MemoryResult<()> {
        self.ensure_healthy()?;
        self.ensure_live(block)?;
        if values.len() > block.count {
            return Err(MemoryError::IndexOutOfBounds {
                index: values.len() - 1,
                count: block.count,
            });
        }
        let memory = self.backing.memory_mut();
        let base = memory.as_mut_ptr().wrapping_add(block.address);
        for (i, value) in values.iter().enumerate() {
            let slot = base.wrapping_add(i * mem::size_of::<T>()).cast::<T>();
            // SAFETY: `i < count`, so the slot lies inside the live payload.
            unsafe { ptr::write_unaligned(slot, *value) };
        }
        Ok(())
    }

    /// Raw payload bytes of a plain-data block
    pub fn payload_bytes<T: Plain>(&self, block: &Block<T>) -> MemoryResult<&[u8]> {
        self.ensure_live(block)?;
        Ok(&self.backing.memory()[block.address..block.address + block.size_bytes()])
    }

    /// Read raw bytes anywhere in the backing buffer
    ///
    /// Ranges overlapping a live constructed payload are refused. Allowed on a
    /// poisoned manager, for post-mortem inspection.
    pub fn read_bytes(&self, address: Address, len: Size) -> MemoryResult<&[u8]> {
        self.check_unprotected(address, len)?;
        let end = address
            .checked_add(len)
            .ok_or(MemoryError::InvalidAddress(address))?;
        self.backing
            .memory()
            .get(address..end)
            .ok_or(MemoryError::InvalidAddress(address))
    }

    /// Write raw bytes anywhere in the backing buffer
    ///
    /// Headers and guard regions are writable on purpose: this is how stray
    /// writes are modelled. Ranges overlapping a live constructed payload are
    /// refused.
    pub fn write_bytes(&mut self, address: Address, bytes: &[u8]) -> MemoryResult<()> {
        self.ensure_healthy()?;
        self.check_unprotected(address, bytes.len())?;
        let end = address
            .checked_add(bytes.len())
            .ok_or(MemoryError::InvalidAddress(address))?;
        let target = self
            .backing
            .memory_mut()
            .get_mut(address..end)
            .ok_or(MemoryError::InvalidAddress(address))?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    fn check_unprotected(&self, address: Address, len: Size) -> MemoryResult<()> {
        let end = address.saturating_add(len);
        let overlap = self.live.iter().find(|(payload, block)| {
            let payload = **payload;
            !block.is_trivial()
                && block.payload_size > 0
                && address < payload + block.payload_size
                && payload < end
        });
        match overlap {
            Some((&payload, block)) => Err(MemoryError::ProtectionViolation(format!(
                "bytes 0x{:x}..0x{:x} overlap constructed {} payload at 0x{:x}",
                address, end, block.type_name, payload
            ))),
            None => Ok(()),
        }
    }
}
