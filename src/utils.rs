//! Bit manipulation helpers shared by the decoder and encoder.

use std::ops::{BitAnd, Shl, Shr};

use num::Integer;

/// Move the bit range [lo, hi) of a word to an offset in the result,
/// zeroing everything else: `((val >> lo) & mask(hi - lo)) << off`.
///
/// The range is checked at compile time: `hi` must exceed `lo` and the
/// relocated field must fit in 32 bits. This is the primitive behind
/// the immediate assembly rules, where single instruction bits scatter
/// across the immediate.
#[macro_export]
macro_rules! bit_field {
    ($val:expr, $hi:literal, $lo:literal, $off:literal) => {{
        const _: () = assert!($hi > $lo, "empty bit range");
        const _: () = assert!($hi - $lo + $off <= 32, "field exceeds 32 bits");
        (($val >> $lo) & (u32::MAX >> (32 - ($hi - $lo)))) << $off
    }};
    ($val:expr, $hi:literal, $lo:literal) => {
        $crate::bit_field!($val, $hi, $lo, 0)
    };
}

/// Value of the bit range [lo, hi) of a word, shifted down to bit 0.
///
/// Runtime companion of [`bit_field!`] for the encoders, where the
/// range bounds arrive as values rather than literals. `hi` must
/// exceed `lo` and stay below the width of T.
pub fn field_range<T>(value: T, hi: T, lo: T) -> T
where
    T: Copy + Integer + Shl<Output = T> + Shr<Output = T> + BitAnd<Output = T>,
{
    ((T::one() << (hi - lo)) - T::one()) & (value >> lo)
}

/// Copy the bit at sign_bit into all higher bits, reinterpreting the
/// result as signed. Implemented as an arithmetic shift up to the top
/// of the word and back down.
pub fn sign_extend(value: u32, sign_bit: u32) -> i32 {
    let left = 31 - sign_bit;
    ((value << left) as i32) >> left
}

/// 64-bit variant of [`sign_extend`], used when widening loaded bytes
/// to the machine word.
pub fn sign_extend64(value: u64, sign_bit: u32) -> i64 {
    let left = 63 - sign_bit;
    ((value << left) as i64) >> left
}
