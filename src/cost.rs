// 5.0: cost function engine. maintains the running sum of squares of all open
// interest and prices trades against C(q) = kappa * sqrt(sum q^2). the sum is
// updated by the per-trade algebraic increment, never by rescanning the domain:
// for a trade touching buckets j with deltas d_j, the change is
// sum_j ((q_j + d_j)^2 - q_j^2), and every untouched bucket contributes zero.

use crate::ledger::{delta_error, Ledger, LedgerError};
use crate::math::U256;
use crate::types::{BucketId, Cost, Kappa, ShareDelta};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CostError {
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("cost potential does not fit the quote amount range")]
    CostOverflow,

    #[error("sum of squares went negative, engine state corrupt")]
    NegativeSumOfSquares,
}

/// A priced trade: the quote-currency cost difference and the sum of squares
/// the engine will hold once the trade commits. Producing a quote has no side
/// effects; `commit` is the only mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeQuote {
    pub cost: Cost,
    pub new_total_q_squared: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEngine {
    kappa: Kappa,
    total_q_squared: U256,
}

impl CostEngine {
    pub fn new(kappa: Kappa) -> Self {
        Self {
            kappa,
            total_q_squared: U256::ZERO,
        }
    }

    pub fn kappa(&self) -> Kappa {
        self.kappa
    }

    pub fn total_q_squared(&self) -> U256 {
        self.total_q_squared
    }

    /// C(sum) = kappa * isqrt(sum), zero at zero.
    pub fn cost_potential(&self, sum_of_squares: U256) -> Result<u128, CostError> {
        if sum_of_squares.is_zero() {
            return Ok(0);
        }
        U256::mul_u128(self.kappa.value(), sum_of_squares.isqrt())
            .as_u128()
            .ok_or(CostError::CostOverflow)
    }

    /// Price a proposed trade without mutating anything. Rejects out-of-order
    /// bucket ids and any delta that would push a bucket's open interest past
    /// capacity or below zero, before any state could change.
    pub fn quote(
        &self,
        ledger: &Ledger,
        ids: &[BucketId],
        deltas: &[ShareDelta],
    ) -> Result<TradeQuote, CostError> {
        if ids.len() != deltas.len() {
            return Err(LedgerError::LengthMismatch {
                ids: ids.len(),
                deltas: deltas.len(),
            }
            .into());
        }
        if ids.is_empty() {
            return Err(LedgerError::EmptyBatch.into());
        }
        for pair in ids.windows(2) {
            if pair[1] <= pair[0] {
                return Err(LedgerError::OutOfOrder {
                    prev: pair[0],
                    next: pair[1],
                }
                .into());
            }
        }

        // increment split into its nonnegative parts: sum of new squares in,
        // sum of old squares out
        let mut squares_in = U256::ZERO;
        let mut squares_out = U256::ZERO;
        for (&bucket, &delta) in ids.iter().zip(deltas) {
            let interest = ledger.open_interest(bucket)?;
            let next = interest
                .checked_apply(delta)
                .ok_or_else(|| delta_error(bucket, interest, delta))?;
            squares_in = squares_in
                .checked_add(U256::mul_u128(next.value(), next.value()))
                .ok_or(CostError::CostOverflow)?;
            squares_out = squares_out
                .checked_add(U256::mul_u128(interest.value(), interest.value()))
                .ok_or(CostError::CostOverflow)?;
        }

        let new_total = self
            .total_q_squared
            .checked_add(squares_in)
            .ok_or(CostError::CostOverflow)?
            .checked_sub(squares_out)
            // post-trade balances are all nonnegative, so a negative sum of
            // squares can only mean the running total no longer matches the
            // ledger
            .ok_or(CostError::NegativeSumOfSquares)?;

        let before = self.cost_potential(self.total_q_squared)?;
        let after = self.cost_potential(new_total)?;
        let cost = signed_difference(after, before)?;

        Ok(TradeQuote {
            cost,
            new_total_q_squared: new_total,
        })
    }

    /// Adopt the sum of squares from a successfully executed trade. Called by
    /// the lifecycle layer only after the ledger write lands.
    pub fn commit(&mut self, new_total_q_squared: U256) {
        self.total_q_squared = new_total_q_squared;
    }
}

fn signed_difference(after: u128, before: u128) -> Result<Cost, CostError> {
    if after >= before {
        i128::try_from(after - before)
            .map(Cost)
            .map_err(|_| CostError::CostOverflow)
    } else {
        i128::try_from(before - after)
            .map(|magnitude| Cost(-magnitude))
            .map_err(|_| CostError::CostOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HolderId, Kappa, FIXED_POINT_ONE};

    fn engine() -> CostEngine {
        CostEngine::new(Kappa::new(FIXED_POINT_ONE).unwrap())
    }

    fn seeded_ledger(bucket: i64, shares: i128) -> Ledger {
        let mut ledger = Ledger::new();
        ledger
            .batch_update(HolderId(1), &[BucketId(bucket)], &[ShareDelta(shares)])
            .unwrap();
        ledger
    }

    #[test]
    fn potential_is_zero_at_zero() {
        assert_eq!(engine().cost_potential(U256::ZERO).unwrap(), 0);
    }

    #[test]
    fn reference_scenario_prices_exactly() {
        // seed: 10 shares in bucket 0 -> sum of squares 100
        let mut cost = engine();
        let ledger = Ledger::new();
        let seed = cost
            .quote(&ledger, &[BucketId(0)], &[ShareDelta(10)])
            .unwrap();
        assert_eq!(seed.new_total_q_squared, U256::from(100));
        assert_eq!(seed.cost.value(), 10 * FIXED_POINT_ONE as i128);
        cost.commit(seed.new_total_q_squared);

        // +5 shares in bucket 0: 100 + 5*(2*10+5) = 225, diff = kappa*(15-10)
        let ledger = seeded_ledger(0, 10);
        let quote = cost
            .quote(&ledger, &[BucketId(0)], &[ShareDelta(5)])
            .unwrap();
        assert_eq!(quote.new_total_q_squared, U256::from(225));
        assert_eq!(quote.cost.value(), 5 * FIXED_POINT_ONE as i128);
    }

    #[test]
    fn quote_is_side_effect_free() {
        let mut cost = engine();
        cost.commit(U256::from(100));
        let ledger = seeded_ledger(0, 10);

        let first = cost.quote(&ledger, &[BucketId(0)], &[ShareDelta(5)]).unwrap();
        let second = cost.quote(&ledger, &[BucketId(0)], &[ShareDelta(5)]).unwrap();
        assert_eq!(first, second);
        assert_eq!(cost.total_q_squared(), U256::from(100));
    }

    #[test]
    fn selling_refunds_with_negative_cost() {
        let mut cost = engine();
        cost.commit(U256::from(225));
        let ledger = seeded_ledger(0, 15);

        let quote = cost
            .quote(&ledger, &[BucketId(0)], &[ShareDelta(-5)])
            .unwrap();
        assert_eq!(quote.new_total_q_squared, U256::from(100));
        assert!(quote.cost.is_refund());
        assert_eq!(quote.cost.value(), -5 * FIXED_POINT_ONE as i128);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let cost = engine();
        let ledger = Ledger::new();
        let err = cost
            .quote(
                &ledger,
                &[BucketId(3), BucketId(3)],
                &[ShareDelta(1), ShareDelta(1)],
            )
            .unwrap_err();
        assert!(matches!(err, CostError::Ledger(LedgerError::OutOfOrder { .. })));
    }

    #[test]
    fn capacity_overflow_rejected_at_quote_time() {
        let cost = engine();
        let ledger = seeded_ledger(0, 1);
        let err = cost
            .quote(
                &ledger,
                &[BucketId(0)],
                &[ShareDelta(crate::types::SHARE_CAPACITY as i128)],
            )
            .unwrap_err();
        assert!(matches!(err, CostError::Ledger(LedgerError::Overflow { .. })));
    }

    #[test]
    fn multi_bucket_increment_sums_per_bucket_terms() {
        let mut cost = engine();
        let mut ledger = Ledger::new();
        ledger
            .batch_update(
                HolderId(1),
                &[BucketId(-1), BucketId(2)],
                &[ShareDelta(3), ShareDelta(4)],
            )
            .unwrap();
        cost.commit(U256::from(9 + 16));

        // deltas +1 on each: (4^2 - 3^2) + (5^2 - 4^2) = 7 + 9 = 16
        let quote = cost
            .quote(
                &ledger,
                &[BucketId(-1), BucketId(2)],
                &[ShareDelta(1), ShareDelta(1)],
            )
            .unwrap();
        assert_eq!(quote.new_total_q_squared, U256::from(41));
    }
}
