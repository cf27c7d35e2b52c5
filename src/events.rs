// 6.0: every accepted state change produces an event. used for audit trails,
// state reconstruction, and notifying the staking/incentive layer. rejected
// operations emit nothing since they mutate nothing.

use crate::math::U256;
use crate::types::{ActorId, BucketId, Cost, HolderId, Outcome, Payout, Shares, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // lifecycle events
    MarketOpened(MarketOpenedEvent),
    MarketResolved(MarketResolvedEvent),
    ResolutionCorrected(ResolutionCorrectedEvent),
    MarketVoided(MarketVoidedEvent),

    // trading events
    SharesTraded(SharesTradedEvent),
    ConfidenceSubmitted(ConfidenceSubmittedEvent),

    // settlement events
    PayoutCollected(PayoutCollectedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketOpenedEvent {
    pub initiator: HolderId,
    pub seed_buckets: Vec<BucketId>,
    pub pool: Payout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesTradedEvent {
    pub holder: HolderId,
    pub buckets: Vec<BucketId>,
    pub cost: Cost,
    pub total_q_squared: U256,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceSubmittedEvent {
    pub holder: HolderId,
    pub buckets: Vec<BucketId>,
    pub cost: Cost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketResolvedEvent {
    pub resolver: ActorId,
    pub outcome: Outcome,
    pub winning_bucket: BucketId,
    pub winning_shares: Shares,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionCorrectedEvent {
    pub corrector: ActorId,
    pub outcome: Outcome,
    pub winning_bucket: BucketId,
    pub winning_shares: Shares,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketVoidedEvent {
    pub actor: ActorId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutCollectedEvent {
    pub holder: HolderId,
    pub amount: Payout,
    pub pool_remaining: Payout,
}
