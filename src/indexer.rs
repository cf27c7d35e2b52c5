// 2.0: outcome domain indexer. maps a raw outcome to its bucket and a bucket to
// its packed storage coordinate. pure functions, no state.
//
// the bucket mapping is floor division so the buckets partition the line exactly:
// bucket b covers [b*unit, b*unit + unit - 1], and bucket 0 is not double-width.
// the word mapping groups three consecutive buckets per storage word for both
// signs of the id, so a trade touching buckets 3k, 3k+1, 3k+2 lands in one word.

use crate::types::{BucketId, Outcome, OutcomeUnit};
use serde::{Deserialize, Serialize};

/// Number of bucket lanes per storage word.
pub const LANES_PER_WORD: i64 = 3;

/// Index of a storage word in the sparse ledger tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WordIndex(pub i64);

/// Storage coordinate of a bucket: word plus lane offset in {0, 1, 2}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedPosition {
    pub word: WordIndex,
    pub lane: u8,
}

/// Bucket containing `outcome`. Floor division, so negative outcomes shift by
/// one relative to truncation at non-multiples of the unit.
pub fn bucket_id_of(outcome: Outcome, unit: OutcomeUnit) -> BucketId {
    BucketId(outcome.0.div_euclid(unit.value()))
}

/// Inclusive endpoints `[start, end]` of a bucket. Widened to i128 so extreme
/// ids near the i64 boundary stay exact.
pub fn endpoints_of(bucket: BucketId, unit: OutcomeUnit) -> (i128, i128) {
    let start = bucket.value() as i128 * unit.value() as i128;
    (start, start + unit.value() as i128 - 1)
}

/// Storage coordinate of a bucket. Bijective over all of i64: euclidean
/// division by 3 gives `word = floor(b/3)` and `lane = b mod 3 ∈ {0,1,2}`
/// for negative ids as well as non-negative ones.
pub fn packed_position_of(bucket: BucketId) -> PackedPosition {
    PackedPosition {
        word: WordIndex(bucket.value().div_euclid(LANES_PER_WORD)),
        lane: bucket.value().rem_euclid(LANES_PER_WORD) as u8,
    }
}

/// Inverse of `packed_position_of`.
pub fn bucket_of_position(word: WordIndex, lane: u8) -> BucketId {
    debug_assert!((lane as i64) < LANES_PER_WORD);
    BucketId(word.0 * LANES_PER_WORD + lane as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(width: i64) -> OutcomeUnit {
        OutcomeUnit::new(width).unwrap()
    }

    #[test]
    fn bucket_of_nonnegative_outcomes() {
        let u = unit(100);
        assert_eq!(bucket_id_of(Outcome(0), u), BucketId(0));
        assert_eq!(bucket_id_of(Outcome(99), u), BucketId(0));
        assert_eq!(bucket_id_of(Outcome(100), u), BucketId(1));
        assert_eq!(bucket_id_of(Outcome(250), u), BucketId(2));
    }

    #[test]
    fn bucket_of_negative_outcomes_shifts() {
        let u = unit(100);
        assert_eq!(bucket_id_of(Outcome(-1), u), BucketId(-1));
        assert_eq!(bucket_id_of(Outcome(-100), u), BucketId(-1));
        assert_eq!(bucket_id_of(Outcome(-101), u), BucketId(-2));
        assert_eq!(bucket_id_of(Outcome(-200), u), BucketId(-2));
    }

    #[test]
    fn buckets_partition_the_line() {
        // every outcome lands in exactly the bucket whose endpoints contain it,
        // with no double-width bucket at the origin
        let u = unit(7);
        for raw in -100i64..=100 {
            let b = bucket_id_of(Outcome(raw), u);
            let (start, end) = endpoints_of(b, u);
            assert!(
                (raw as i128) >= start && (raw as i128) <= end,
                "outcome {raw} outside bucket {b} = [{start}, {end}]"
            );
        }
        // adjacent buckets tile with no gap or overlap
        for id in -30i64..30 {
            let (_, end) = endpoints_of(BucketId(id), u);
            let (next_start, _) = endpoints_of(BucketId(id + 1), u);
            assert_eq!(end + 1, next_start);
        }
    }

    #[test]
    fn packed_position_round_trips() {
        for id in (-2000i64..=2000).chain([i64::MIN / 3, i64::MAX / 3]) {
            let pos = packed_position_of(BucketId(id));
            assert!(pos.lane < 3);
            assert_eq!(bucket_of_position(pos.word, pos.lane), BucketId(id));
        }
    }

    #[test]
    fn packed_position_matches_truncating_formula_for_negatives() {
        // the reference mapping for negative ids is wordIndex = (b - 2) / 3 with
        // truncating division; euclidean division by 3 agrees with it everywhere
        for id in -10_000i64..0 {
            let pos = packed_position_of(BucketId(id));
            assert_eq!(pos.word.0, (id - 2) / 3);
            assert_eq!(pos.lane as i64, ((id % 3) + 3) % 3);
        }
    }

    #[test]
    fn three_consecutive_buckets_share_a_word_from_lane_zero() {
        for first in [-9i64, -6, -3, 0, 3, 42] {
            let p0 = packed_position_of(BucketId(first));
            let p1 = packed_position_of(BucketId(first + 1));
            let p2 = packed_position_of(BucketId(first + 2));
            assert_eq!(p0.lane, 0);
            assert_eq!((p0.word, p1.word, p2.word), (p0.word, p0.word, p0.word));
            assert_eq!((p1.lane, p2.lane), (1, 2));
        }
    }
}
