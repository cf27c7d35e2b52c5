//! Parimutuel Market Core Simulation.
//!
//! Walks the full market lifecycle: seeding, cost-function pricing, confidence
//! submissions, resolution with a late correction, and pro-rata payouts.

use parimutuel_core::*;

const RESOLVER: ActorId = ActorId(1);
const CORRECTOR: ActorId = ActorId(2);
const STAKING_LAYER: ActorId = ActorId(3);

fn main() {
    println!("Parimutuel Market Core Simulation");
    println!("Bucketed ledger, kappa*sqrt(sum q^2) pricing, deterministic settlement\n");

    scenario_1_pricing();
    scenario_2_spread_trading();
    scenario_3_resolution_and_payout();
    scenario_4_confidence_submissions();

    println!("\nAll simulations completed successfully.");
}

fn market_params(cutoff: Option<Timestamp>) -> MarketParams {
    MarketParams {
        unit: OutcomeUnit::new(100).unwrap(),
        kappa: Kappa::new(FIXED_POINT_ONE).unwrap(),
        cutoff,
        resolver: RESOLVER,
        corrector: CORRECTOR,
        correction_window_ms: 3_600_000,
        submitter: Some(STAKING_LAYER),
    }
}

/// The reference pricing walkthrough: seed 10 shares, buy 5 more.
fn scenario_1_pricing() {
    println!("Scenario 1: Cost-Function Pricing\n");

    let market = Market::open(
        market_params(None),
        HolderId(1),
        &[BucketId(0)],
        &[10],
        Timestamp::from_millis(0),
    )
    .unwrap();

    println!("  Seeded bucket 0 with 10 shares");
    println!("  Sum of squares: {}", market.total_q_squared());
    println!("  Pool (initiator stake): {}", market.payout_pool());

    let quote = market
        .calculate_cost_of_trade(&[BucketId(0)], &[ShareDelta(5)])
        .unwrap();
    println!("  Quote for +5 shares in bucket 0: cost {}", quote.cost);
    println!("  New sum of squares would be: {}\n", quote.new_total_q_squared);
}

/// Several holders spreading exposure over buckets on both sides of zero.
fn scenario_2_spread_trading() {
    println!("Scenario 2: Spread Trading Across the Domain\n");

    let mut market = Market::open(
        market_params(None),
        HolderId(1),
        &[BucketId(-1), BucketId(0), BucketId(1)],
        &[5, 10, 5],
        Timestamp::from_millis(0),
    )
    .unwrap();

    let cost = market
        .buy_shares(
            HolderId(2),
            &[BucketId(-3), BucketId(-2), BucketId(-1)],
            &[ShareDelta(2), ShareDelta(4), ShareDelta(6)],
            Timestamp::from_millis(1_000),
        )
        .unwrap();
    println!("  Holder 2 buys a bearish ladder for {cost}");

    let cost = market
        .buy_shares(
            HolderId(3),
            &[BucketId(2), BucketId(3)],
            &[ShareDelta(8), ShareDelta(8)],
            Timestamp::from_millis(2_000),
        )
        .unwrap();
    println!("  Holder 3 buys a bullish pair for {cost}");

    let below = market
        .outstanding_shares_in_range(Outcome(-300), Outcome(-1))
        .unwrap();
    let above = market
        .outstanding_shares_in_range(Outcome(0), Outcome(399))
        .unwrap();
    println!("  Open interest below zero: {below}, at or above zero: {above}");
    println!("  Pool now holds: {}\n", market.payout_pool());
}

/// Resolution, a corrected outcome, and pro-rata settlement.
fn scenario_3_resolution_and_payout() {
    println!("Scenario 3: Resolution and Payout\n");

    let mut market = Market::open(
        market_params(None),
        HolderId(1),
        &[BucketId(0)],
        &[10],
        Timestamp::from_millis(0),
    )
    .unwrap();
    market
        .buy_shares(
            HolderId(2),
            &[BucketId(0), BucketId(1)],
            &[ShareDelta(10), ShareDelta(20)],
            Timestamp::from_millis(1_000),
        )
        .unwrap();

    market
        .resolve(RESOLVER, Outcome(150), Timestamp::from_millis(10_000))
        .unwrap();
    let resolution = *market.resolution().unwrap();
    println!(
        "  Resolved to outcome 150 -> bucket {} ({} winning shares)",
        resolution.bucket, resolution.winning_shares_at_close
    );

    // the dispute layer moves the outcome into the shared bucket
    market
        .correct_resolution(CORRECTOR, Outcome(42), Timestamp::from_millis(500_000))
        .unwrap();
    let resolution = *market.resolution().unwrap();
    println!(
        "  Corrected to outcome 42 -> bucket {} ({} winning shares)",
        resolution.bucket, resolution.winning_shares_at_close
    );

    let early = market.collect_payout(HolderId(1), Timestamp::from_millis(600_000));
    println!("  Claim during the dispute window rejected: {}", early.unwrap_err());

    for holder in [HolderId(1), HolderId(2)] {
        let amount = market
            .collect_payout(holder, Timestamp::from_millis(4_000_000))
            .unwrap();
        println!("  Holder {} collects {}", holder.0, amount);
    }
    println!("  Pool remaining after claims: {}\n", market.payout_pool());
}

/// The staking layer submits one confidence position per holder.
fn scenario_4_confidence_submissions() {
    println!("Scenario 4: Confidence Submissions\n");

    let cutoff = Timestamp::from_millis(100_000);
    let mut market = Market::open(
        market_params(Some(cutoff)),
        HolderId(1),
        &[BucketId(0)],
        &[1],
        Timestamp::from_millis(0),
    )
    .unwrap();

    market
        .submit_confidence_shares(
            STAKING_LAYER,
            HolderId(10),
            &[BucketId(2)],
            &[ShareDelta(25)],
            Timestamp::from_millis(1_000),
        )
        .unwrap();
    println!("  Holder 10 submitted 25 shares of confidence in bucket 2");

    let repeat = market.submit_confidence_shares(
        STAKING_LAYER,
        HolderId(10),
        &[BucketId(3)],
        &[ShareDelta(1)],
        Timestamp::from_millis(2_000),
    );
    println!("  Second submission rejected: {}", repeat.unwrap_err());

    let late = market.submit_confidence_shares(
        STAKING_LAYER,
        HolderId(11),
        &[BucketId(1)],
        &[ShareDelta(5)],
        Timestamp::from_millis(200_000),
    );
    println!("  Post-cutoff submission rejected: {}", late.unwrap_err());

    market
        .resolve(RESOLVER, Outcome(250), Timestamp::from_millis(300_000))
        .unwrap();
    let payout = market
        .collect_payout(HolderId(10), Timestamp::from_millis(4_000_000))
        .unwrap();
    println!("  Holder 10 wins the pool: {payout}");
    println!("  Events recorded: {}", market.events().len());
}
