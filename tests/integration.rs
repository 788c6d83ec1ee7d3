//! End-to-end tests driving [`trade_recon::engine::Engine`] over the full
//! rule cascade, per spec §8's testable properties: pool integrity, the
//! six concrete scenarios running together, determinism, and monotonicity
//! of enabling an extra rule.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trade_recon::config::Config;
use trade_recon::engine::Engine;
use trade_recon::ids::TradeId;
use trade_recon::month::ContractMonth;
use trade_recon::report::ReconStatus;
use trade_recon::trade::{BuySell, Side, Trade, TradeInput, Unit};

fn cfg() -> Config {
    Config::default()
}

#[allow(clippy::too_many_arguments)]
fn row(
    id: &str,
    source: Side,
    product: &str,
    month: &str,
    qty: Decimal,
    unit: Unit,
    price: Decimal,
    bs: BuySell,
) -> TradeInput {
    TradeInput {
        id: TradeId::from(id),
        source,
        product: product.into(),
        contract_month: ContractMonth::parse(month).unwrap(),
        quantity: qty,
        unit,
        price,
        buy_sell: bs,
        broker_group_id: Some(1),
        exch_clearing_acct_id: Some(1),
        exchange_group_id: None,
        strike: None,
        put_call: None,
        spread_flag: None,
        deal_id: None,
        trade_native_id: None,
        trade_datetime: None,
    }
}

fn build(input: TradeInput, config: &Config) -> Trade {
    let ratio = config.ratio_for(&input.product.to_lowercase());
    Trade::new(input, ratio).unwrap()
}

#[test]
fn empty_input_yields_empty_output_with_no_errors() {
    let config = cfg();
    let (engine, errors) = Engine::new(&config);
    assert!(errors.is_empty());
    let report = engine.run(vec![], vec![], &config);
    assert!(report.matches.is_empty());
    assert!(report.unmatched_trader.is_empty());
    assert!(report.unmatched_exchange.is_empty());
    assert!(report.rows.is_empty());
    assert!(report.pool_integrity_ok);
}

#[test]
fn scenario_s1_exact_match_end_to_end() {
    let config = cfg();
    let trader = build(
        row("t1", Side::Trader, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy),
        &config,
    );
    let exchange = build(
        row("e1", Side::Exchange, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy),
        &config,
    );
    let (engine, _) = Engine::new(&config);
    let report = engine.run(vec![trader], vec![exchange], &config);

    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].rule_number, 1);
    assert_eq!(report.matches[0].confidence, 100);
    assert!(report.pool_integrity_ok);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.rows[0].status, ReconStatus::Matched);
}

/// Scenarios S1..S6 fed to the engine together, each on a distinct
/// `exch_clearing_acct_id` bucket so rules can't cross-pollinate candidates
/// across scenarios. Verifies every rule fires inside one cascade and every
/// input trade is accounted for (spec §8 invariant 1).
#[test]
fn all_six_concrete_scenarios_match_in_one_cascade() {
    let config = cfg();
    let mut trader = Vec::new();
    let mut exchange = Vec::new();

    // S1: exact
    trader.push(row("s1-t", Side::Trader, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy));
    exchange.push(row("s1-e", Side::Exchange, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy));

    // S2: crack MT<->BBL
    trader.push(row(
        "s2-t",
        Side::Trader,
        "marine 0.5% crack",
        "Mar-25",
        dec!(2040),
        Unit::Mt,
        dec!(3.10),
        BuySell::Buy,
    ));
    exchange.push(row(
        "s2-e",
        Side::Exchange,
        "marine 0.5% crack",
        "Mar-25",
        dec!(13000),
        Unit::Bbl,
        dec!(3.10),
        BuySell::Buy,
    ));

    // S3: spread
    trader.push(row("s3-t1", Side::Trader, "x", "Mar-25", dec!(1000), Unit::Mt, dec!(2.5), BuySell::Buy));
    trader.push(row("s3-t2", Side::Trader, "x", "Apr-25", dec!(1000), Unit::Mt, dec!(0), BuySell::Sell));
    exchange.push(row("s3-e1", Side::Exchange, "x", "Mar-25", dec!(1000), Unit::Mt, dec!(82.5), BuySell::Buy));
    exchange.push(row("s3-e2", Side::Exchange, "x", "Apr-25", dec!(1000), Unit::Mt, dec!(80), BuySell::Sell));

    // S4: aggregation, two trader rows -> one exchange row
    trader.push(row("s4-t1", Side::Trader, "y", "May-25", dec!(500), Unit::Mt, dec!(10), BuySell::Buy));
    trader.push(row("s4-t2", Side::Trader, "y", "May-25", dec!(500), Unit::Mt, dec!(10), BuySell::Buy));
    exchange.push(row("s4-e1", Side::Exchange, "y", "May-25", dec!(1000), Unit::Mt, dec!(10), BuySell::Buy));

    // S5: complex crack
    trader.push(row(
        "s5-t",
        Side::Trader,
        "380cst crack",
        "Mar-25",
        dec!(1000),
        Unit::Mt,
        dec!(5.00),
        BuySell::Sell,
    ));
    exchange.push(row("s5-e1", Side::Exchange, "380cst", "Mar-25", dec!(1000), Unit::Mt, dec!(444.5), BuySell::Sell));
    exchange.push(row(
        "s5-e2",
        Side::Exchange,
        "brent swap",
        "Mar-25",
        dec!(6350),
        Unit::Bbl,
        dec!(65.00),
        BuySell::Buy,
    ));

    // S6: hyphenated product spread
    trader.push(row("s6-t1", Side::Trader, "prod_a", "Apr-25", dec!(1000), Unit::Mt, dec!(1.2), BuySell::Sell));
    trader.push(row("s6-t2", Side::Trader, "prod_b", "Apr-25", dec!(1000), Unit::Mt, dec!(0), BuySell::Buy));
    exchange.push(row(
        "s6-e",
        Side::Exchange,
        "prod_a-prod_b",
        "Apr-25",
        dec!(1000),
        Unit::Mt,
        dec!(1.2),
        BuySell::Sell,
    ));

    let trader_trades: Vec<Trade> = trader.into_iter().map(|r| build(r, &config)).collect();
    let exchange_trades: Vec<Trade> = exchange.into_iter().map(|r| build(r, &config)).collect();

    let total_trader = trader_trades.len();
    let total_exchange = exchange_trades.len();

    let (engine, errors) = Engine::new(&config);
    assert!(errors.is_empty());
    let report = engine.run(trader_trades, exchange_trades, &config);

    assert!(report.pool_integrity_ok);
    assert!(report.unmatched_trader.is_empty(), "unmatched trader: {:?}", report.unmatched_trader);
    assert!(report.unmatched_exchange.is_empty(), "unmatched exchange: {:?}", report.unmatched_exchange);

    let matched_trader_legs: usize = report.matches.iter().map(|m| m.trader_leg_count()).sum();
    let matched_exchange_legs: usize = report.matches.iter().map(|m| m.exchange_leg_count()).sum();
    assert_eq!(matched_trader_legs, total_trader);
    assert_eq!(matched_exchange_legs, total_exchange);

    let rule_numbers: std::collections::BTreeSet<u8> = report.matches.iter().map(|m| m.rule_number).collect();
    assert!(rule_numbers.contains(&1), "rule 1 (exact) should have fired");
    assert!(rule_numbers.contains(&2), "rule 2 (spread) should have fired");
    assert!(rule_numbers.contains(&3), "rule 3 (crack) should have fired");
    assert!(rule_numbers.contains(&4), "rule 4 (complex crack) should have fired");
    assert!(rule_numbers.contains(&5), "rule 5 (product spread) should have fired");
    assert!(rule_numbers.contains(&7), "rule 7 (aggregation) should have fired");
}

/// Spec §8 law: running the engine twice over the same input yields the
/// same sequence of matches.
#[test]
fn running_engine_twice_is_deterministic() {
    let config = cfg();
    let make_inputs = || {
        let trader = vec![build(
            row("t1", Side::Trader, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy),
            &config,
        )];
        let exchange = vec![build(
            row("e1", Side::Exchange, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy),
            &config,
        )];
        (trader, exchange)
    };

    let (engine, _) = Engine::new(&config);
    let (t1, e1) = make_inputs();
    let run1 = engine.run(t1, e1, &config);
    let (t2, e2) = make_inputs();
    let run2 = engine.run(t2, e2, &config);

    assert_eq!(run1.matches.len(), run2.matches.len());
    for (a, b) in run1.matches.iter().zip(run2.matches.iter()) {
        assert_eq!(a.rule_number, b.rule_number);
        assert_eq!(a.trader_primary.id, b.trader_primary.id);
        assert_eq!(a.exchange_primary.id, b.exchange_primary.id);
    }
}

/// Spec §8 law: enabling an additional rule can only increase the total
/// number of matches, never decrease it. Here a trader pair that only rule
/// 7 (aggregation) can resolve is left unmatched when rule 7 is disabled,
/// then resolved once it is enabled.
#[test]
fn enabling_aggregation_rule_increases_match_count_monotonically() {
    let mut config = cfg();
    let trader = vec![
        build(row("t1", Side::Trader, "y", "May-25", dec!(500), Unit::Mt, dec!(10), BuySell::Buy), &config),
        build(row("t2", Side::Trader, "y", "May-25", dec!(500), Unit::Mt, dec!(10), BuySell::Buy), &config),
    ];
    let exchange = vec![build(
        row("e1", Side::Exchange, "y", "May-25", dec!(1000), Unit::Mt, dec!(10), BuySell::Buy),
        &config,
    )];

    config.processing_order = vec![1, 2, 3, 4, 5, 6];
    let (engine_without_7, _) = Engine::new(&config);
    let report_without_7 = engine_without_7.run(trader.clone(), exchange.clone(), &config);
    assert!(report_without_7.matches.is_empty());

    config.processing_order = vec![1, 2, 3, 4, 5, 6, 7];
    let (engine_with_7, _) = Engine::new(&config);
    let report_with_7 = engine_with_7.run(trader, exchange, &config);
    assert_eq!(report_with_7.matches.len(), 1);
    assert_eq!(report_with_7.matches[0].rule_number, 7);
}

/// Spec §7: a rule id in `processing_order` with no registered matcher is
/// skipped with a (non-fatal) configuration error, and the rest of the
/// cascade still runs.
#[test]
fn unknown_rule_id_is_skipped_without_aborting_the_cascade() {
    let mut config = cfg();
    config.processing_order = vec![1, 42];
    let (engine, errors) = Engine::new(&config);
    assert_eq!(errors.len(), 1);

    let trader = vec![build(
        row("t1", Side::Trader, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy),
        &config,
    )];
    let exchange = vec![build(
        row("e1", Side::Exchange, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy),
        &config,
    )];
    let report = engine.run(trader, exchange, &config);
    assert_eq!(report.matches.len(), 1);
    assert!(report.pool_integrity_ok);
}

/// Boundary behaviour (spec §8): a quantity exactly on the crack tolerance
/// boundary matches; exceeding it by the minimum fixed-point increment does
/// not.
#[test]
fn crack_quantity_exactly_on_tolerance_boundary_matches() {
    let config = cfg();
    // 2040 MT * 7 (default ratio, "crack" not in per-product override map
    // for this made-up product) = 14280 BBL; exchange reports 14280 + 500
    // (== tol_bbl) exactly on the boundary.
    let trader = vec![build(
        row("t1", Side::Trader, "widget crack", "Mar-25", dec!(2040), Unit::Mt, dec!(3.10), BuySell::Buy),
        &config,
    )];
    let exchange = vec![build(
        row(
            "e1",
            Side::Exchange,
            "widget crack",
            "Mar-25",
            dec!(14780),
            Unit::Bbl,
            dec!(3.10),
            BuySell::Buy,
        ),
        &config,
    )];
    let (engine, _) = Engine::new(&config);
    let report = engine.run(trader, exchange, &config);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].rule_number, 3);
}

#[test]
fn crack_quantity_one_cent_past_tolerance_boundary_does_not_match() {
    let config = cfg();
    let trader = vec![build(
        row("t1", Side::Trader, "widget crack", "Mar-25", dec!(2040), Unit::Mt, dec!(3.10), BuySell::Buy),
        &config,
    )];
    let exchange = vec![build(
        row(
            "e1",
            Side::Exchange,
            "widget crack",
            "Mar-25",
            dec!(14780.01),
            Unit::Bbl,
            dec!(3.10),
            BuySell::Buy,
        ),
        &config,
    )];
    let (engine, _) = Engine::new(&config);
    let report = engine.run(trader, exchange, &config);
    assert!(report.matches.is_empty());
    assert_eq!(report.unmatched_trader.len(), 1);
    assert_eq!(report.unmatched_exchange.len(), 1);
}

/// Negative spread differentials are legal (spec §8 boundary behaviour).
#[test]
fn negative_spread_price_is_legal_and_matches() {
    let config = cfg();
    let trader = vec![
        build(row("t1", Side::Trader, "x", "Mar-25", dec!(1000), Unit::Mt, dec!(-2.5), BuySell::Buy), &config),
        build(row("t2", Side::Trader, "x", "Apr-25", dec!(1000), Unit::Mt, dec!(0), BuySell::Sell), &config),
    ];
    let exchange = vec![
        build(row("e1", Side::Exchange, "x", "Mar-25", dec!(1000), Unit::Mt, dec!(80), BuySell::Buy), &config),
        build(row("e2", Side::Exchange, "x", "Apr-25", dec!(1000), Unit::Mt, dec!(82.5), BuySell::Sell), &config),
    ];
    let (engine, _) = Engine::new(&config);
    let report = engine.run(trader, exchange, &config);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].rule_number, 2);
}

/// A match whose universal fields (broker group / exchange clearing
/// account) disagree across sides must never be produced (spec §8
/// invariant 4), even though every other field lines up exactly.
#[test]
fn mismatched_universal_fields_block_an_otherwise_exact_match() {
    let config = cfg();
    let mut trader_input = row("t1", Side::Trader, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy);
    trader_input.broker_group_id = Some(1);
    let mut exchange_input = row("e1", Side::Exchange, "FE", "Oct-25", dec!(15000), Unit::Mt, dec!(101.65), BuySell::Buy);
    exchange_input.broker_group_id = Some(2);

    let trader = vec![build(trader_input, &config)];
    let exchange = vec![build(exchange_input, &config)];
    let (engine, _) = Engine::new(&config);
    let report = engine.run(trader, exchange, &config);
    assert!(report.matches.is_empty());
    assert_eq!(report.unmatched_trader.len(), 1);
    assert_eq!(report.unmatched_exchange.len(), 1);
}
