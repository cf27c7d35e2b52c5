// 7.0: market lifecycle. one Market owns the ledger and the cost engine and is
// the only writer of market-state fields. operations are strictly sequential:
// each call either commits in full or returns an error with no visible change.
//
// time never comes from a clock here. every time-sensitive operation takes the
// caller's current timestamp, so replaying an identical call sequence produces
// a bit-identical market.

use crate::cost::{CostEngine, CostError, TradeQuote};
use crate::events::{
    ConfidenceSubmittedEvent, Event, EventId, EventPayload, MarketOpenedEvent,
    MarketResolvedEvent, MarketVoidedEvent, PayoutCollectedEvent, ResolutionCorrectedEvent,
    SharesTradedEvent,
};
use crate::indexer::bucket_id_of;
use crate::ledger::{Ledger, LedgerError};
use crate::math::mul_div_floor;
use crate::types::{
    ActorId, BucketId, Cost, HolderId, Kappa, Outcome, OutcomeUnit, Payout, ShareDelta, Shares,
    Timestamp,
};
use crate::math::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    /// Accepting trades, bounded by the optional cutoff.
    Open,
    /// Outcome known, ledger frozen, payouts claimable. Terminal.
    Resolved,
    /// Trading disabled without an outcome; refunds happen off-engine. Terminal.
    Voided,
}

/// Static market configuration, immutable after `Market::open`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketParams {
    /// Bucket width of the outcome partition.
    pub unit: OutcomeUnit,
    /// Pricing constant, fixed-point 1e18.
    pub kappa: Kappa,
    /// Last moment trading is allowed, if any. Trades at or past it are rejected.
    pub cutoff: Option<Timestamp>,
    /// The collaborator allowed to resolve.
    pub resolver: ActorId,
    /// The privileged actor allowed to correct a resolution or void the market.
    pub corrector: ActorId,
    /// How long after resolution a correction is still accepted.
    pub correction_window_ms: i64,
    /// The single caller allowed to submit confidence shares, when enabled.
    pub submitter: Option<ActorId>,
}

impl MarketParams {
    fn validate(&self, now: Timestamp) -> Result<(), MarketError> {
        if let Some(cutoff) = self.cutoff {
            if cutoff <= now {
                return Err(MarketError::CutoffInPast { cutoff, now });
            }
        }
        if self.correction_window_ms < 0 {
            return Err(MarketError::NegativeCorrectionWindow {
                window_ms: self.correction_window_ms,
            });
        }
        Ok(())
    }
}

/// Snapshot taken when the resolver supplies the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub outcome: Outcome,
    pub bucket: BucketId,
    pub winning_shares_at_close: Shares,
    /// Pool frozen at resolution; pro-rata shares are computed against this,
    /// not against the shrinking remainder.
    pub pool_at_close: Payout,
    pub resolved_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarketError {
    // configuration
    #[error("cutoff {cutoff:?} is not after creation time {now:?}")]
    CutoffInPast { cutoff: Timestamp, now: Timestamp },

    #[error("correction window must be nonnegative, got {window_ms}ms")]
    NegativeCorrectionWindow { window_ms: i64 },

    #[error("seed distribution is empty")]
    EmptySeed,

    #[error("seed share count must be positive, got {shares} for bucket {bucket}")]
    NonPositiveSeed { bucket: BucketId, shares: u128 },

    // state
    #[error("market already resolved")]
    AlreadyResolved,

    #[error("market is voided")]
    Voided,

    #[error("market is not resolved")]
    NotResolved,

    #[error("trading cutoff {cutoff:?} passed at {now:?}")]
    PastCutoff { cutoff: Timestamp, now: Timestamp },

    #[error("actor {0:?} is not authorized for this operation")]
    Unauthorized(ActorId),

    #[error("confidence submission requires positive deltas, got {delta} for bucket {bucket}")]
    NonPositiveConfidence { bucket: BucketId, delta: i128 },

    #[error("holder {0:?} already submitted confidence for this market")]
    AlreadySubmitted(HolderId),

    #[error("correction window closed: resolved at {resolved_at:?}, now {now:?}")]
    CorrectionWindowClosed {
        resolved_at: Timestamp,
        now: Timestamp,
    },

    // payout
    #[error("payouts locked until the correction window closes: resolved at {resolved_at:?}, now {now:?}")]
    SettlementLocked {
        resolved_at: Timestamp,
        now: Timestamp,
    },

    #[error("holder {0:?} already collected their payout")]
    AlreadyClaimed(HolderId),

    #[error("holder {0:?} has nothing to collect")]
    NothingToPay(HolderId),

    #[error("payout pool accounting inconsistent")]
    PoolInconsistent,

    // delegated tiers
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("pricing error: {0}")]
    Cost(#[from] CostError),
}

#[derive(Debug, Clone)]
pub struct Market {
    params: MarketParams,
    ledger: Ledger,
    cost: CostEngine,
    status: MarketStatus,
    resolution: Option<Resolution>,
    /// Quote currency held by the market: seed stake plus net trade costs.
    pool: Payout,
    confidence_submitted: BTreeSet<HolderId>,
    claimed: BTreeSet<HolderId>,
    events: Vec<Event>,
    next_event_id: u64,
}

impl Market {
    /// One-time construction with a non-empty seed distribution. The seed is
    /// priced like any trade; its cost is the initiator's stake and becomes
    /// the initial payout pool.
    pub fn open(
        params: MarketParams,
        initiator: HolderId,
        seed_buckets: &[BucketId],
        seed_shares: &[u128],
        now: Timestamp,
    ) -> Result<Self, MarketError> {
        params.validate(now)?;
        if seed_buckets.is_empty() || seed_shares.is_empty() {
            return Err(MarketError::EmptySeed);
        }
        if seed_buckets.len() != seed_shares.len() {
            return Err(MarketError::Ledger(LedgerError::LengthMismatch {
                ids: seed_buckets.len(),
                deltas: seed_shares.len(),
            }));
        }
        let mut deltas = Vec::with_capacity(seed_shares.len());
        for (&bucket, &shares) in seed_buckets.iter().zip(seed_shares) {
            if shares == 0 || shares > Shares::MAX.value() {
                return Err(MarketError::NonPositiveSeed { bucket, shares });
            }
            deltas.push(ShareDelta(shares as i128));
        }

        let kappa = params.kappa;
        let mut market = Self {
            params,
            ledger: Ledger::new(),
            cost: CostEngine::new(kappa),
            status: MarketStatus::Open,
            resolution: None,
            pool: Payout::ZERO,
            confidence_submitted: BTreeSet::new(),
            claimed: BTreeSet::new(),
            events: Vec::new(),
            next_event_id: 1,
        };

        let quote = market.cost.quote(&market.ledger, seed_buckets, &deltas)?;
        market.ledger.batch_update(initiator, seed_buckets, &deltas)?;
        market.cost.commit(quote.new_total_q_squared);
        // all seed deltas are positive, so the quoted cost is nonnegative
        market.pool = Payout(quote.cost.value().unsigned_abs());

        market.emit(
            now,
            EventPayload::MarketOpened(MarketOpenedEvent {
                initiator,
                seed_buckets: seed_buckets.to_vec(),
                pool: market.pool,
            }),
        );
        Ok(market)
    }

    // --- trading ---

    /// Read-only pricing query. Never mutates, safe to call in any state.
    pub fn calculate_cost_of_trade(
        &self,
        ids: &[BucketId],
        deltas: &[ShareDelta],
    ) -> Result<TradeQuote, MarketError> {
        Ok(self.cost.quote(&self.ledger, ids, deltas)?)
    }

    /// Execute a trade: price it, apply it to the ledger, commit the new sum
    /// of squares, and settle the cost against the pool. Any rejection leaves
    /// every piece of state untouched.
    pub fn buy_shares(
        &mut self,
        holder: HolderId,
        ids: &[BucketId],
        deltas: &[ShareDelta],
        now: Timestamp,
    ) -> Result<Cost, MarketError> {
        self.ensure_tradable(now)?;
        let quote = self.cost.quote(&self.ledger, ids, deltas)?;
        let new_pool = self.settled_pool(quote.cost)?;

        self.ledger.batch_update(holder, ids, deltas)?;
        self.cost.commit(quote.new_total_q_squared);
        self.pool = new_pool;

        self.emit(
            now,
            EventPayload::SharesTraded(SharesTradedEvent {
                holder,
                buckets: ids.to_vec(),
                cost: quote.cost,
                total_q_squared: quote.new_total_q_squared,
            }),
        );
        Ok(quote.cost)
    }

    /// Restricted variant for the staking/incentive collaborator: positive
    /// deltas only, and each holder gets exactly one submission per market.
    pub fn submit_confidence_shares(
        &mut self,
        caller: ActorId,
        holder: HolderId,
        ids: &[BucketId],
        deltas: &[ShareDelta],
        now: Timestamp,
    ) -> Result<Cost, MarketError> {
        if self.params.submitter != Some(caller) {
            return Err(MarketError::Unauthorized(caller));
        }
        self.ensure_tradable(now)?;
        for (&bucket, &delta) in ids.iter().zip(deltas) {
            if delta.value() <= 0 {
                return Err(MarketError::NonPositiveConfidence {
                    bucket,
                    delta: delta.value(),
                });
            }
        }
        if self.confidence_submitted.contains(&holder) {
            return Err(MarketError::AlreadySubmitted(holder));
        }

        let quote = self.cost.quote(&self.ledger, ids, deltas)?;
        let new_pool = self.settled_pool(quote.cost)?;

        self.ledger.batch_update(holder, ids, deltas)?;
        self.cost.commit(quote.new_total_q_squared);
        self.pool = new_pool;
        self.confidence_submitted.insert(holder);

        self.emit(
            now,
            EventPayload::ConfidenceSubmitted(ConfidenceSubmittedEvent {
                holder,
                buckets: ids.to_vec(),
                cost: quote.cost,
            }),
        );
        Ok(quote.cost)
    }

    // --- resolution ---

    /// One-shot, resolver only. Maps the outcome to its bucket and snapshots
    /// that bucket's open interest and the pool.
    pub fn resolve(
        &mut self,
        caller: ActorId,
        outcome: Outcome,
        now: Timestamp,
    ) -> Result<(), MarketError> {
        if caller != self.params.resolver {
            return Err(MarketError::Unauthorized(caller));
        }
        match self.status {
            MarketStatus::Resolved => return Err(MarketError::AlreadyResolved),
            MarketStatus::Voided => return Err(MarketError::Voided),
            MarketStatus::Open => {}
        }

        let bucket = bucket_id_of(outcome, self.params.unit);
        let winning_shares = self.ledger.open_interest(bucket)?;
        self.resolution = Some(Resolution {
            outcome,
            bucket,
            winning_shares_at_close: winning_shares,
            pool_at_close: self.pool,
            resolved_at: now,
        });
        self.status = MarketStatus::Resolved;

        self.emit(
            now,
            EventPayload::MarketResolved(MarketResolvedEvent {
                resolver: caller,
                outcome,
                winning_bucket: bucket,
                winning_shares,
            }),
        );
        Ok(())
    }

    /// Late dispute handling: the corrector may re-point the resolved outcome
    /// within the correction window. Trading stays closed; the pool snapshot
    /// is unchanged.
    pub fn correct_resolution(
        &mut self,
        caller: ActorId,
        outcome: Outcome,
        now: Timestamp,
    ) -> Result<(), MarketError> {
        if caller != self.params.corrector {
            return Err(MarketError::Unauthorized(caller));
        }
        let resolution = match self.status {
            MarketStatus::Resolved => self
                .resolution
                .as_ref()
                .copied()
                .ok_or(MarketError::NotResolved)?,
            MarketStatus::Voided => return Err(MarketError::Voided),
            MarketStatus::Open => return Err(MarketError::NotResolved),
        };
        if now.millis_since(resolution.resolved_at) > self.params.correction_window_ms {
            return Err(MarketError::CorrectionWindowClosed {
                resolved_at: resolution.resolved_at,
                now,
            });
        }

        let bucket = bucket_id_of(outcome, self.params.unit);
        let winning_shares = self.ledger.open_interest(bucket)?;
        self.resolution = Some(Resolution {
            outcome,
            bucket,
            winning_shares_at_close: winning_shares,
            // the window stays anchored to the original resolution
            resolved_at: resolution.resolved_at,
            pool_at_close: resolution.pool_at_close,
        });

        self.emit(
            now,
            EventPayload::ResolutionCorrected(ResolutionCorrectedEvent {
                corrector: caller,
                outcome,
                winning_bucket: bucket,
                winning_shares,
            }),
        );
        Ok(())
    }

    /// Disable trading without an outcome. Contribution refunds are handled by
    /// an external accounting path, not by the payout pool.
    pub fn void(&mut self, caller: ActorId, now: Timestamp) -> Result<(), MarketError> {
        if caller != self.params.corrector {
            return Err(MarketError::Unauthorized(caller));
        }
        match self.status {
            MarketStatus::Resolved => return Err(MarketError::AlreadyResolved),
            MarketStatus::Voided => return Err(MarketError::Voided),
            MarketStatus::Open => {}
        }
        self.status = MarketStatus::Voided;
        self.emit(now, EventPayload::MarketVoided(MarketVoidedEvent { actor: caller }));
        Ok(())
    }

    // --- settlement ---

    /// Pro-rata share of the pool snapshot: floor(pool * balance / winning).
    /// Zero when the winning bucket closed empty.
    pub fn calculate_payout(&self, holder: HolderId) -> Result<Payout, MarketError> {
        let resolution = self.require_resolution()?;
        if resolution.winning_shares_at_close.is_zero() {
            return Ok(Payout::ZERO);
        }
        let balance = self.ledger.balance(holder, resolution.bucket)?;
        let amount = mul_div_floor(
            resolution.pool_at_close.value(),
            balance.value(),
            resolution.winning_shares_at_close.value(),
        )
        .ok_or(MarketError::PoolInconsistent)?;
        Ok(Payout(amount))
    }

    /// Pay a holder's share exactly once. Claims are locked while the
    /// correction window is still open, since a correction can re-point the
    /// winning bucket; they unlock the instant the window can no longer
    /// accept one. Repeat calls and zero entitlements fail with a payout
    /// error and change nothing.
    pub fn collect_payout(
        &mut self,
        holder: HolderId,
        now: Timestamp,
    ) -> Result<Payout, MarketError> {
        let resolved_at = self.require_resolution()?.resolved_at;
        if now.millis_since(resolved_at) <= self.params.correction_window_ms {
            return Err(MarketError::SettlementLocked { resolved_at, now });
        }
        if self.claimed.contains(&holder) {
            return Err(MarketError::AlreadyClaimed(holder));
        }
        let amount = self.calculate_payout(holder)?;
        if amount.is_zero() {
            return Err(MarketError::NothingToPay(holder));
        }
        let remaining = self
            .pool
            .value()
            .checked_sub(amount.value())
            .ok_or(MarketError::PoolInconsistent)?;

        self.claimed.insert(holder);
        self.pool = Payout(remaining);

        self.emit(
            now,
            EventPayload::PayoutCollected(PayoutCollectedEvent {
                holder,
                amount,
                pool_remaining: self.pool,
            }),
        );
        Ok(amount)
    }

    // --- read accessors ---

    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    pub fn status(&self) -> MarketStatus {
        self.status
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        self.resolution.as_ref()
    }

    pub fn payout_pool(&self) -> Payout {
        self.pool
    }

    pub fn total_q_squared(&self) -> U256 {
        self.cost.total_q_squared()
    }

    pub fn bucket_id(&self, outcome: Outcome) -> BucketId {
        bucket_id_of(outcome, self.params.unit)
    }

    pub fn bucket_outstanding_shares(&self, bucket: BucketId) -> Result<Shares, MarketError> {
        Ok(self.ledger.open_interest(bucket)?)
    }

    pub fn balance_of_shares(
        &self,
        holder: HolderId,
        bucket: BucketId,
    ) -> Result<Shares, MarketError> {
        Ok(self.ledger.balance(holder, bucket)?)
    }

    /// Total open interest over the buckets covering `[low, high]` outcomes.
    pub fn outstanding_shares_in_range(
        &self,
        low: Outcome,
        high: Outcome,
    ) -> Result<u128, MarketError> {
        let lo = bucket_id_of(low, self.params.unit);
        let hi = bucket_id_of(high, self.params.unit);
        Ok(self.ledger.open_interest_in_range(lo, hi)?)
    }

    pub fn has_submitted_confidence(&self, holder: HolderId) -> bool {
        self.confidence_submitted.contains(&holder)
    }

    pub fn has_claimed(&self, holder: HolderId) -> bool {
        self.claimed.contains(&holder)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    // --- internals ---

    fn ensure_tradable(&self, now: Timestamp) -> Result<(), MarketError> {
        match self.status {
            MarketStatus::Resolved => return Err(MarketError::AlreadyResolved),
            MarketStatus::Voided => return Err(MarketError::Voided),
            MarketStatus::Open => {}
        }
        if let Some(cutoff) = self.params.cutoff {
            if now >= cutoff {
                return Err(MarketError::PastCutoff { cutoff, now });
            }
        }
        Ok(())
    }

    fn require_resolution(&self) -> Result<&Resolution, MarketError> {
        match self.status {
            MarketStatus::Resolved => self.resolution.as_ref().ok_or(MarketError::NotResolved),
            MarketStatus::Voided => Err(MarketError::Voided),
            MarketStatus::Open => Err(MarketError::NotResolved),
        }
    }

    // pool after settling a signed trade cost. costs telescope, so a refund
    // never exceeds the pool unless state is corrupt.
    fn settled_pool(&self, cost: Cost) -> Result<Payout, MarketError> {
        self.pool
            .value()
            .checked_add_signed(cost.value())
            .map(Payout)
            .ok_or(MarketError::PoolInconsistent)
    }

    fn emit(&mut self, now: Timestamp, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), now, payload);
        self.next_event_id += 1;
        self.events.push(event);
    }
}
