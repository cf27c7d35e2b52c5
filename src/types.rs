// 1.0: all the primitives live here. nothing in the engine works without these types.
// ids, outcomes, buckets, share counts, fixed-point quote amounts. each is a newtype
// so the compiler catches type mixups.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point scale for quote amounts: 1e18 = 1.0.
pub const FIXED_POINT_ONE: u128 = 1_000_000_000_000_000_000;

/// Per-lane share capacity. 80 bits, kept as a policy ceiling even though the
/// in-memory lane is a full u128.
pub const SHARE_CAPACITY: u128 = (1u128 << 80) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HolderId(pub u64);

/// Identity of a privileged collaborator (resolver, corrector, submitter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub u64);

/// Raw outcome value in integer domain units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outcome(pub i64);

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.1: bucket index. bucket b covers [b*unit, b*unit + unit - 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketId(pub i64);

impl BucketId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.2: bucket width in outcome units. must be positive, immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeUnit(i64);

impl OutcomeUnit {
    #[must_use]
    pub fn new(width: i64) -> Option<Self> {
        if width > 0 {
            Some(Self(width))
        } else {
            None
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OutcomeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: nonnegative share count, capped at SHARE_CAPACITY by policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Shares(u128);

impl Shares {
    pub const ZERO: Shares = Shares(0);
    pub const MAX: Shares = Shares(SHARE_CAPACITY);

    #[must_use]
    pub fn new(count: u128) -> Option<Self> {
        if count <= SHARE_CAPACITY {
            Some(Self(count))
        } else {
            None
        }
    }

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Apply a signed delta. None when the result would be negative or above
    /// the capacity ceiling.
    #[must_use]
    pub fn checked_apply(&self, delta: ShareDelta) -> Option<Shares> {
        let next = (self.0 as i128).checked_add(delta.value())?;
        if next < 0 {
            return None;
        }
        Shares::new(next as u128)
    }
}

impl fmt::Display for Shares {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: signed per-bucket share delta. positive = buy, negative = sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShareDelta(pub i128);

impl ShareDelta {
    pub fn value(&self) -> i128 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for ShareDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.5: pricing constant kappa. fixed-point 1e18 scale, must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kappa(u128);

impl Kappa {
    #[must_use]
    pub fn new(value: u128) -> Option<Self> {
        if value > 0 {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for Kappa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= i128::MAX as u128 {
            write!(f, "{}", fixed_point_decimal(self.0 as i128))
        } else {
            write!(f, "{}e-18", self.0)
        }
    }
}

// 1.6: signed quote amount in fixed-point units. trade cost, refunds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cost(pub i128);

impl Cost {
    pub const ZERO: Cost = Cost(0);

    pub fn value(&self) -> i128 {
        self.0
    }

    pub fn is_refund(&self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", fixed_point_decimal(self.0))
    }
}

// 1.7: nonnegative quote amount in fixed-point units. payout pool, claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Payout(pub u128);

impl Payout {
    pub const ZERO: Payout = Payout(0);

    pub fn value(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Payout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 <= i128::MAX as u128 {
            write!(f, "{}", fixed_point_decimal(self.0 as i128))
        } else {
            write!(f, "{}e-18", self.0)
        }
    }
}

/// Render a fixed-point amount as a decimal with 18 fractional digits.
/// Falls back to raw notation when the mantissa exceeds Decimal's 96 bits.
fn fixed_point_decimal(value: i128) -> String {
    if value.unsigned_abs() < (1u128 << 96) {
        Decimal::from_i128_with_scale(value, 18).normalize().to_string()
    } else {
        format!("{value}e-18")
    }
}

// 1.8: millisecond timestamp. the engine has no clock of its own; callers pass
// the current time into every time-sensitive operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    pub fn millis_since(&self, earlier: Timestamp) -> i64 {
        self.0 - earlier.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn share_capacity_is_80_bits() {
        assert_eq!(SHARE_CAPACITY, 2u128.pow(80) - 1);
        assert_eq!(Shares::MAX.value(), SHARE_CAPACITY);
        assert!(Shares::new(SHARE_CAPACITY).is_some());
        assert!(Shares::new(SHARE_CAPACITY + 1).is_none());
    }

    #[test]
    fn shares_checked_apply() {
        let ten = Shares::new(10).unwrap();
        assert_eq!(ten.checked_apply(ShareDelta(5)), Shares::new(15));
        assert_eq!(ten.checked_apply(ShareDelta(-10)), Some(Shares::ZERO));
        assert_eq!(ten.checked_apply(ShareDelta(-11)), None);

        let near_cap = Shares::new(SHARE_CAPACITY - 1).unwrap();
        assert_eq!(near_cap.checked_apply(ShareDelta(1)), Some(Shares::MAX));
        assert_eq!(near_cap.checked_apply(ShareDelta(2)), None);
    }

    #[test]
    fn outcome_unit_rejects_nonpositive() {
        assert!(OutcomeUnit::new(1).is_some());
        assert!(OutcomeUnit::new(0).is_none());
        assert!(OutcomeUnit::new(-100).is_none());
    }

    #[test]
    fn kappa_rejects_zero() {
        assert!(Kappa::new(0).is_none());
        assert_eq!(Kappa::new(FIXED_POINT_ONE).unwrap().value(), FIXED_POINT_ONE);
    }

    #[test]
    fn cost_displays_as_decimal() {
        let five = Cost(5 * FIXED_POINT_ONE as i128);
        assert_eq!(five.to_string(), dec!(5).to_string());
        let fraction = Cost(FIXED_POINT_ONE as i128 / 2);
        assert_eq!(fraction.to_string(), dec!(0.5).to_string());
        let refund = Cost(-(FIXED_POINT_ONE as i128));
        assert!(refund.is_refund());
        assert_eq!(refund.to_string(), dec!(-1).to_string());
    }

    #[test]
    fn timestamp_elapsed() {
        let t0 = Timestamp::from_millis(1_000);
        let t1 = Timestamp::from_millis(4_500);
        assert_eq!(t1.millis_since(t0), 3_500);
        assert_eq!(t0.millis_since(t1), -3_500);
    }
}
