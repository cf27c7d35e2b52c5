// 3.0: wide integer arithmetic. the running sum of squares can hold values up
// to N * (2^80 - 1)^2, which is past u128, so the engine carries it in a small
// in-crate 256-bit unsigned integer. everything here is pure integer math and
// bit-identical across platforms, which the determinism contract requires.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unsigned 256-bit integer as two u128 limbs. Field order (hi, lo) makes the
/// derived lexicographic Ord the numeric order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct U256 {
    hi: u128,
    lo: u128,
}

impl U256 {
    pub const ZERO: U256 = U256 { hi: 0, lo: 0 };

    pub fn from_parts(hi: u128, lo: u128) -> Self {
        Self { hi, lo }
    }

    pub fn is_zero(&self) -> bool {
        self.hi == 0 && self.lo == 0
    }

    /// Low limb when the value fits in u128.
    pub fn as_u128(&self) -> Option<u128> {
        if self.hi == 0 {
            Some(self.lo)
        } else {
            None
        }
    }

    pub fn checked_add(self, other: U256) -> Option<U256> {
        let (lo, carry) = self.lo.overflowing_add(other.lo);
        let hi = self.hi.checked_add(other.hi)?.checked_add(carry as u128)?;
        Some(U256 { hi, lo })
    }

    /// None when `other > self`.
    pub fn checked_sub(self, other: U256) -> Option<U256> {
        if other > self {
            return None;
        }
        let (lo, borrow) = self.lo.overflowing_sub(other.lo);
        let hi = self.hi - other.hi - borrow as u128;
        Some(U256 { hi, lo })
    }

    /// Exact 128x128 -> 256 bit product via 64-bit half-limbs.
    pub fn mul_u128(a: u128, b: u128) -> U256 {
        const MASK: u128 = (1u128 << 64) - 1;
        let (a1, a0) = (a >> 64, a & MASK);
        let (b1, b0) = (b >> 64, b & MASK);

        let p00 = a0 * b0;
        let p01 = a0 * b1;
        let p10 = a1 * b0;
        let p11 = a1 * b1;

        let (mid, mid_carry) = p01.overflowing_add(p10);
        let (lo, lo_carry) = p00.overflowing_add(mid << 64);
        let hi = p11 + (mid >> 64) + ((mid_carry as u128) << 64) + lo_carry as u128;

        U256 { hi, lo }
    }

    fn shl(self, n: u32) -> U256 {
        debug_assert!(n < 256);
        match n {
            0 => self,
            1..=127 => U256 {
                hi: (self.hi << n) | (self.lo >> (128 - n)),
                lo: self.lo << n,
            },
            128 => U256 { hi: self.lo, lo: 0 },
            _ => U256 {
                hi: self.lo << (n - 128),
                lo: 0,
            },
        }
    }

    fn shr(self, n: u32) -> U256 {
        debug_assert!(n < 256);
        match n {
            0 => self,
            1..=127 => U256 {
                hi: self.hi >> n,
                lo: (self.lo >> n) | (self.hi << (128 - n)),
            },
            128 => U256 { hi: 0, lo: self.hi },
            _ => U256 {
                hi: 0,
                lo: self.hi >> (n - 128),
            },
        }
    }

    // internal arithmetic for callers that have already established the bounds
    fn wrapping_add(self, other: U256) -> U256 {
        let (lo, carry) = self.lo.overflowing_add(other.lo);
        let hi = self.hi.wrapping_add(other.hi).wrapping_add(carry as u128);
        U256 { hi, lo }
    }

    fn wrapping_sub(self, other: U256) -> U256 {
        debug_assert!(other <= self);
        let (lo, borrow) = self.lo.overflowing_sub(other.lo);
        let hi = self.hi.wrapping_sub(other.hi).wrapping_sub(borrow as u128);
        U256 { hi, lo }
    }

    fn bit(&self, i: u32) -> bool {
        if i >= 128 {
            (self.hi >> (i - 128)) & 1 == 1
        } else {
            (self.lo >> i) & 1 == 1
        }
    }

    /// Floor integer square root. `isqrt(x)^2 <= x < (isqrt(x)+1)^2`. The root
    /// of a 256-bit value always fits in u128. Binary restoring method, one
    /// bit of the result per step.
    pub fn isqrt(self) -> u128 {
        if self.is_zero() {
            return 0;
        }
        let mut remainder = self;
        let mut result = U256::ZERO;
        // highest power of four not exceeding the argument
        let mut bit = U256::from_parts(1u128 << 126, 0);
        while bit > remainder {
            bit = bit.shr(2);
        }
        while !bit.is_zero() {
            // the accumulator stays below the initial bit, so these never wrap
            let candidate = result.wrapping_add(bit);
            if remainder >= candidate {
                remainder = remainder.wrapping_sub(candidate);
                result = result.shr(1).wrapping_add(bit);
            } else {
                result = result.shr(1);
            }
            bit = bit.shr(2);
        }
        // result of a 256-bit sqrt always has a zero high limb
        result.lo
    }
}

impl From<u128> for U256 {
    fn from(value: u128) -> Self {
        U256 { hi: 0, lo: value }
    }
}

impl fmt::Display for U256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hi == 0 {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{:#x}{:032x}", self.hi, self.lo)
        }
    }
}

/// `floor(a * b / d)` with a full 256-bit intermediate product. None on a zero
/// divisor or a quotient past u128. Exact rational semantics with a single
/// final floor, as settlement requires.
pub fn mul_div_floor(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }
    let product = U256::mul_u128(a, b);
    let divisor = U256::from(d);

    let mut remainder = U256::ZERO;
    let mut quotient = U256::ZERO;
    for i in (0..256).rev() {
        remainder = remainder.shl(1);
        if product.bit(i) {
            remainder.lo |= 1;
        }
        if remainder >= divisor {
            remainder = remainder.checked_sub(divisor)?;
            quotient = quotient.checked_add(U256::from(1).shl(i))?;
        }
    }
    quotient.as_u128()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sub_round_trip_with_carry() {
        let a = U256::from_parts(3, u128::MAX);
        let one = U256::from(1);
        let sum = a.checked_add(one).unwrap();
        assert_eq!(sum, U256::from_parts(4, 0));
        assert_eq!(sum.checked_sub(one).unwrap(), a);
        assert_eq!(one.checked_sub(a), None);
    }

    #[test]
    fn mul_u128_matches_narrow_products() {
        assert_eq!(U256::mul_u128(0, u128::MAX), U256::ZERO);
        assert_eq!(U256::mul_u128(7, 6), U256::from(42));
        // (2^64)^2 = 2^128
        assert_eq!(
            U256::mul_u128(1 << 64, 1 << 64),
            U256::from_parts(1, 0)
        );
        assert_eq!(
            U256::mul_u128(u128::MAX, u128::MAX),
            U256::from_parts(u128::MAX - 1, 1)
        );
    }

    #[test]
    fn isqrt_exact_squares() {
        assert_eq!(U256::ZERO.isqrt(), 0);
        assert_eq!(U256::from(1).isqrt(), 1);
        assert_eq!(U256::from(225).isqrt(), 15);
        assert_eq!(U256::mul_u128(u128::MAX, u128::MAX).isqrt(), u128::MAX);
    }

    #[test]
    fn isqrt_floors_between_squares() {
        assert_eq!(U256::from(2).isqrt(), 1);
        assert_eq!(U256::from(224).isqrt(), 14);
        assert_eq!(U256::from(226).isqrt(), 15);
        let huge = U256::mul_u128(u128::MAX, u128::MAX)
            .checked_sub(U256::from(1))
            .unwrap();
        assert_eq!(huge.isqrt(), u128::MAX - 1);
    }

    #[test]
    fn isqrt_bounds_hold_for_wide_values() {
        for hi in [0u128, 1, 999, 1 << 79] {
            let x = U256::from_parts(hi, 123_456_789);
            let root = x.isqrt();
            let square = U256::mul_u128(root, root);
            assert!(square <= x);
            let next = U256::mul_u128(root + 1, root + 1);
            assert!(next > x);
        }
    }

    #[test]
    fn mul_div_floor_exact_and_floored() {
        assert_eq!(mul_div_floor(10, 10, 4), Some(25));
        assert_eq!(mul_div_floor(10, 10, 3), Some(33));
        assert_eq!(mul_div_floor(7, 0, 3), Some(0));
        assert_eq!(mul_div_floor(1, 1, 0), None);
    }

    #[test]
    fn mul_div_floor_wide_intermediate() {
        // product overflows u128 but the quotient fits
        let a = u128::MAX;
        assert_eq!(mul_div_floor(a, 1000, 1000), Some(a));
        assert_eq!(mul_div_floor(a, 4, 8), Some(a / 2));
        // quotient itself overflows
        assert_eq!(mul_div_floor(a, 2, 1), None);
    }
}
