// 4.0: packed ledger. sparse storage for global open interest and per-holder
// balances. three bucket lanes per storage word, each lane capped at the 80-bit
// share capacity. updates are validate-then-apply so a rejected batch leaves
// both tables untouched, including buckets earlier in the same batch.

use crate::indexer::{bucket_of_position, packed_position_of, PackedPosition, WordIndex};
use crate::types::{BucketId, HolderId, ShareDelta, Shares, SHARE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One storage word: three consecutive buckets' share counts. Lanes are full
/// u128 in memory; the 80-bit ceiling is enforced on every write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedWord {
    lanes: [u128; 3],
}

impl PackedWord {
    pub fn lane(&self, lane: u8) -> u128 {
        self.lanes[lane as usize]
    }

    fn is_empty(&self) -> bool {
        self.lanes == [0, 0, 0]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("batch has {ids} bucket ids but {deltas} deltas")]
    LengthMismatch { ids: usize, deltas: usize },

    #[error("batch is empty")]
    EmptyBatch,

    #[error("bucket ids not strictly increasing: {prev} then {next}")]
    OutOfOrder { prev: BucketId, next: BucketId },

    #[error("bucket {bucket}: {current} + {delta} exceeds share capacity")]
    Overflow {
        bucket: BucketId,
        current: u128,
        delta: i128,
    },

    #[error("bucket {bucket}: cannot remove {delta} from balance {current}")]
    InsufficientShares {
        bucket: BucketId,
        current: u128,
        delta: i128,
    },

    #[error("bucket {bucket}: stored value {stored} above capacity, ledger corrupt")]
    Corrupt { bucket: BucketId, stored: u128 },
}

/// Fully validated single-lane write, produced in phase one and applied in
/// phase two. Applying a plan cannot fail.
#[derive(Debug, Clone, Copy)]
struct LaneWrite {
    position: PackedPosition,
    new_global: u128,
    new_balance: u128,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    open_interest: BTreeMap<WordIndex, PackedWord>,
    balances: HashMap<HolderId, BTreeMap<WordIndex, PackedWord>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global open interest for one bucket.
    pub fn open_interest(&self, bucket: BucketId) -> Result<Shares, LedgerError> {
        read_lane(&self.open_interest, bucket)
    }

    /// One holder's balance for one bucket.
    pub fn balance(&self, holder: HolderId, bucket: BucketId) -> Result<Shares, LedgerError> {
        match self.balances.get(&holder) {
            Some(table) => read_lane(table, bucket),
            None => Ok(Shares::ZERO),
        }
    }

    /// Sum of open interest over an inclusive bucket range. Walks only the
    /// sparse words that exist, never the bucket domain.
    pub fn open_interest_in_range(
        &self,
        lo: BucketId,
        hi: BucketId,
    ) -> Result<u128, LedgerError> {
        if lo > hi {
            return Ok(0);
        }
        let lo_word = packed_position_of(lo).word;
        let hi_word = packed_position_of(hi).word;
        let mut total: u128 = 0;
        for (&word, packed) in self.open_interest.range(lo_word..=hi_word) {
            for lane in 0..3u8 {
                let bucket = bucket_of_position(word, lane);
                if bucket < lo || bucket > hi {
                    continue;
                }
                let value = packed.lane(lane);
                if value > SHARE_CAPACITY {
                    return Err(LedgerError::Corrupt {
                        bucket,
                        stored: value,
                    });
                }
                total = total.checked_add(value).ok_or(LedgerError::Overflow {
                    bucket,
                    current: total,
                    delta: value as i128,
                })?;
            }
        }
        Ok(total)
    }

    /// Every bucket with nonzero open interest, in bucket order. Used by
    /// settlement sweeps and by the from-scratch aggregate checks in tests.
    pub fn nonzero_open_interest(&self) -> impl Iterator<Item = (BucketId, u128)> + '_ {
        self.open_interest.iter().flat_map(|(&word, packed)| {
            (0..3u8).filter_map(move |lane| {
                let value = packed.lane(lane);
                (value > 0).then(|| (bucket_of_position(word, lane), value))
            })
        })
    }

    /// Apply signed deltas to the global table and one holder's table in a
    /// single logical operation. Validates the whole batch first: any failure
    /// leaves the ledger exactly as it was.
    pub fn batch_update(
        &mut self,
        holder: HolderId,
        ids: &[BucketId],
        deltas: &[ShareDelta],
    ) -> Result<(), LedgerError> {
        let plan = self.plan_batch(holder, ids, deltas)?;
        self.apply_plan(holder, &plan, true);
        Ok(())
    }

    /// Reference path: identical validation and semantics to `batch_update`
    /// but every lane is committed individually, with no whole-word writes.
    /// Exists so the equivalence of the two commit paths stays a tested
    /// property rather than an assumption.
    pub fn batch_update_unbatched(
        &mut self,
        holder: HolderId,
        ids: &[BucketId],
        deltas: &[ShareDelta],
    ) -> Result<(), LedgerError> {
        let plan = self.plan_batch(holder, ids, deltas)?;
        self.apply_plan(holder, &plan, false);
        Ok(())
    }

    // phase one: ordering check, reads, and the capacity check for every lane,
    // global and holder alike. no writes.
    fn plan_batch(
        &self,
        holder: HolderId,
        ids: &[BucketId],
        deltas: &[ShareDelta],
    ) -> Result<Vec<LaneWrite>, LedgerError> {
        if ids.len() != deltas.len() {
            return Err(LedgerError::LengthMismatch {
                ids: ids.len(),
                deltas: deltas.len(),
            });
        }
        if ids.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        for pair in ids.windows(2) {
            if pair[1] <= pair[0] {
                return Err(LedgerError::OutOfOrder {
                    prev: pair[0],
                    next: pair[1],
                });
            }
        }

        let mut plan = Vec::with_capacity(ids.len());
        for (&bucket, &delta) in ids.iter().zip(deltas) {
            let global = self.open_interest(bucket)?;
            let balance = self.balance(holder, bucket)?;
            let new_global = global
                .checked_apply(delta)
                .ok_or_else(|| delta_error(bucket, global, delta))?;
            let new_balance = balance
                .checked_apply(delta)
                .ok_or_else(|| delta_error(bucket, balance, delta))?;
            plan.push(LaneWrite {
                position: packed_position_of(bucket),
                new_global: new_global.value(),
                new_balance: new_balance.value(),
            });
        }
        Ok(plan)
    }

    // phase two: infallible. `word_batching` enables the three-lanes-in-one-word
    // commit when a run of writes covers lanes 0..2 of a single word.
    fn apply_plan(&mut self, holder: HolderId, plan: &[LaneWrite], word_batching: bool) {
        let holder_table = self.balances.entry(holder).or_default();
        let mut i = 0;
        while i < plan.len() {
            if word_batching && full_word_run(plan, i) {
                let word = plan[i].position.word;
                write_word(&mut self.open_interest, word, |packed| {
                    for lane in 0..3 {
                        packed.lanes[lane] = plan[i + lane].new_global;
                    }
                });
                write_word(holder_table, word, |packed| {
                    for lane in 0..3 {
                        packed.lanes[lane] = plan[i + lane].new_balance;
                    }
                });
                i += 3;
            } else {
                let write = plan[i];
                write_word(&mut self.open_interest, write.position.word, |packed| {
                    packed.lanes[write.position.lane as usize] = write.new_global;
                });
                write_word(holder_table, write.position.word, |packed| {
                    packed.lanes[write.position.lane as usize] = write.new_balance;
                });
                i += 1;
            }
        }
        if holder_table.is_empty() {
            self.balances.remove(&holder);
        }
    }
}

pub(crate) fn delta_error(bucket: BucketId, current: Shares, delta: ShareDelta) -> LedgerError {
    if delta.is_negative() {
        LedgerError::InsufficientShares {
            bucket,
            current: current.value(),
            delta: delta.value(),
        }
    } else {
        LedgerError::Overflow {
            bucket,
            current: current.value(),
            delta: delta.value(),
        }
    }
}

fn read_lane(
    table: &BTreeMap<WordIndex, PackedWord>,
    bucket: BucketId,
) -> Result<Shares, LedgerError> {
    let position = packed_position_of(bucket);
    let value = table
        .get(&position.word)
        .map_or(0, |packed| packed.lane(position.lane));
    Shares::new(value).ok_or(LedgerError::Corrupt {
        bucket,
        stored: value,
    })
}

// three plan entries covering lanes 0, 1, 2 of the same word
fn full_word_run(plan: &[LaneWrite], i: usize) -> bool {
    plan.len() - i >= 3
        && plan[i].position.lane == 0
        && plan[i + 1].position.lane == 1
        && plan[i + 2].position.lane == 2
        && plan[i + 1].position.word == plan[i].position.word
        && plan[i + 2].position.word == plan[i].position.word
}

fn write_word<F>(table: &mut BTreeMap<WordIndex, PackedWord>, word: WordIndex, update: F)
where
    F: FnOnce(&mut PackedWord),
{
    let packed = table.entry(word).or_default();
    update(packed);
    if packed.is_empty() {
        table.remove(&word);
    }
}
