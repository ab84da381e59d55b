/*!
 * Lifecycle and Arity Strategies
 *
 * Callers state explicitly how a block's elements are built and torn down
 * (`Trivial` or `Constructed`) and whether a release covers one element or
 * an array (`Scalar` or `Array`). Both axes are type parameters, so the
 * selection costs nothing at runtime.
 */

use super::plain::Plain;
use std::marker::PhantomData;
use std::mem;
use std::ptr;

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::Trivial {}
    impl Sealed for super::Constructed {}
    impl Sealed for super::Scalar {}
    impl Sealed for super::Array {}
}

/// Construction/destruction strategy for elements of type `T`
///
/// Sealed: the manager's soundness depends on these implementations.
pub trait Lifecycle<T>: sealed::Sealed {
    /// Name used in diagnostics and mismatch errors
    const NAME: &'static str;

    /// Whether elements skip construction and destruction
    const TRIVIAL: bool;

    /// Build `count` elements starting at `payload`, index 0 first
    ///
    /// If building element `k` panics, elements `0..k` are dropped in reverse
    /// before the panic continues.
    ///
    /// # Safety
    ///
    /// `payload` must be valid for writes of `count * size_of::<T>()` bytes.
    unsafe fn construct(payload: *mut u8, count: usize);

    /// Drop `count` elements starting at `payload`, highest index first
    ///
    /// # Safety
    ///
    /// `payload` must hold `count` live elements built by [`Lifecycle::construct`]
    /// and not dropped since.
    unsafe fn destruct(payload: *mut u8, count: usize);
}

/// Plain data: memory is reserved, never initialised or dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct Trivial;

/// Default-constructed on allocation, dropped on release
#[derive(Debug, Clone, Copy, Default)]
pub struct Constructed;

impl<T: Plain> Lifecycle<T> for Trivial {
    const NAME: &'static str = "trivial";
    const TRIVIAL: bool = true;

    #[inline]
    unsafe fn construct(_payload: *mut u8, _count: usize) {}

    #[inline]
    unsafe fn destruct(_payload: *mut u8, _count: usize) {}
}

impl<T: Default> Lifecycle<T> for Constructed {
    const NAME: &'static str = "constructed";
    const TRIVIAL: bool = false;

    unsafe fn construct(payload: *mut u8, count: usize) {
        let mut partial = PartialInit::<T> {
            payload,
            built: 0,
            _marker: PhantomData,
        };
        for index in 0..count {
            let value = T::default();
            ptr::write_unaligned(element_ptr::<T>(payload, index), value);
            partial.built = index + 1;
        }
        mem::forget(partial);
    }

    unsafe fn destruct(payload: *mut u8, count: usize) {
        drop_elements::<T>(payload, count);
    }
}

/// Drops elements `count - 1` down to `0`
///
/// # Safety
///
/// Same contract as [`Lifecycle::destruct`].
pub(crate) unsafe fn drop_elements<T>(payload: *mut u8, count: usize) {
    for index in (0..count).rev() {
        drop(ptr::read_unaligned(element_ptr::<T>(payload, index)));
    }
}

#[inline]
pub(crate) fn element_ptr<T>(payload: *mut u8, index: usize) -> *mut T {
    payload.wrapping_add(index * mem::size_of::<T>()).cast::<T>()
}

/// Rolls back a construction loop that unwinds part way
struct PartialInit<T> {
    payload: *mut u8,
    built: usize,
    _marker: PhantomData<T>,
}

impl<T> Drop for PartialInit<T> {
    fn drop(&mut self) {
        // SAFETY: exactly `built` elements were written and none dropped.
        unsafe { drop_elements::<T>(self.payload, self.built) }
    }
}

/// Whether a release covers a single element or a run of them
pub trait Arity: sealed::Sealed {
    const IS_ARRAY: bool;
    const NAME: &'static str;
}

/// Single-instance tag
#[derive(Debug, Clone, Copy, Default)]
pub struct Scalar;

/// Array tag
#[derive(Debug, Clone, Copy, Default)]
pub struct Array;

impl Arity for Scalar {
    const IS_ARRAY: bool = false;
    const NAME: &'static str = "scalar";
}

impl Arity for Array {
    const IS_ARRAY: bool = true;
    const NAME: &'static str = "array";
}
