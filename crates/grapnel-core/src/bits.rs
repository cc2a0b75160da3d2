//! Raw byte reinterpretation helpers.
//!
//! The register engine works on the kernel's `user` dump as one flat block
//! of bytes and reinterprets slices of it at catalog-provided offsets.
//! These helpers centralize the `unsafe` needed for that so the rest of the
//! crate can stay in safe code.

use std::mem;
use std::ptr;
use std::slice;

/// Read a `T` from the start of `bytes`.
///
/// The read is unaligned; register offsets inside the `user` structure are
/// not all aligned to the value being read (e.g. the `ah` subregister).
///
/// # Panics
///
/// Panics when `bytes` is shorter than `size_of::<T>()`.
pub(crate) fn from_bytes<T: Copy>(bytes: &[u8]) -> T
{
    assert!(
        bytes.len() >= mem::size_of::<T>(),
        "from_bytes: need {} bytes, have {}",
        mem::size_of::<T>(),
        bytes.len()
    );

    // SAFETY: the length was checked above and T is Copy, so any bit
    // pattern read from the buffer is a valid value of T for the plain-data
    // types this crate instantiates (integers, floats, byte arrays).
    unsafe {
        ptr::read_unaligned(bytes.as_ptr().cast::<T>())
    }
}

/// View any sized value as its raw little-endian bytes.
pub(crate) fn as_bytes<T>(value: &T) -> &[u8]
{
    // SAFETY: a shared borrow of T is readable for size_of::<T>() bytes.
    unsafe {
        slice::from_raw_parts(ptr::from_ref(value).cast::<u8>(), mem::size_of::<T>())
    }
}

/// Mutable byte view over any sized value.
///
/// Only used on the `libc::user` register dump, where every bit pattern is
/// a valid value.
pub(crate) fn as_bytes_mut<T>(value: &mut T) -> &mut [u8]
{
    // SAFETY: an exclusive borrow of T is writable for size_of::<T>()
    // bytes, and the caller only instantiates this with plain-data FFI
    // structs for which all bit patterns are valid.
    unsafe {
        slice::from_raw_parts_mut(ptr::from_mut(value).cast::<u8>(), mem::size_of::<T>())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn from_bytes_reads_unaligned()
    {
        let buf = [0u8, 0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11];
        let value: u64 = from_bytes(&buf[1..]);
        assert_eq!(value, 0x1122_3344_5566_7788);
    }

    #[test]
    fn as_bytes_round_trips()
    {
        let value = 0xDEAD_BEEFu32;
        let bytes = as_bytes(&value);
        assert_eq!(from_bytes::<u32>(bytes), value);
    }

    #[test]
    #[should_panic(expected = "from_bytes")]
    fn from_bytes_panics_on_short_input()
    {
        let buf = [0u8; 3];
        let _: u32 = from_bytes(&buf);
    }
}
