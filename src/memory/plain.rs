/*!
 * Plain Data Marker
 * Types that need no construction or destruction
 */

/// Marker for plain data
///
/// # Safety
///
/// Implementors must be valid for every bit pattern, contain no padding and
/// own no resources. Trivial blocks hand out their payload bytes for direct
/// reading and writing, so any byte sequence must be a valid value.
pub unsafe trait Plain: Copy + 'static {}

macro_rules! impl_plain {
    ($($t:ty),* $(,)?) => {
        $(unsafe impl Plain for $t {})*
    };
}

impl_plain!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

unsafe impl<T: Plain, const N: usize> Plain for [T; N] {}
