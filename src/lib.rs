// parimutuel-core: continuous-outcome parimutuel market engine.
// deterministic-first architecture: every operation is a sequential state
// transition with no I/O, no clock, and no partial commits.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: HolderId, BucketId, Shares, Kappa, Cost, Timestamp
//   2.x  indexer.rs: outcome -> bucket mapping, bucket -> packed word coordinate
//   3.x  math.rs: 256-bit integer, isqrt, floor mul-div
//   4.x  ledger.rs: packed sparse ledger: open interest + per-holder balances
//   5.x  cost.rs: C(q) = kappa*sqrt(sum q^2) pricing, incremental aggregate
//   6.x  events.rs: state transition events for audit
//   7.x  market.rs: lifecycle: open, trade, resolve, correct, void, payout

pub mod cost;
pub mod events;
pub mod indexer;
pub mod ledger;
pub mod market;
pub mod math;
pub mod types;

// re exports for convenience
pub use cost::*;
pub use events::*;
pub use indexer::*;
pub use ledger::*;
pub use market::*;
pub use math::*;
pub use types::*;
