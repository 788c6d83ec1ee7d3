//! Rule 13 — AGGREGATED PRODUCT SPREAD (confidence per config). Grounds on
//! `original_source/ice_match/matchers/aggregated_product_spread_matcher.py`:
//! three scenarios layering rule 7's exact-sum aggregation on top of rule
//! 5's cross-product spread validation.

use super::Matcher;
use super::support::universal_and_option_ok;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::trade::{BuySell, Trade};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::info;

pub struct AggregatedProductSpreadMatcher;

fn direction_ok(spread_bs: BuySell, x_leg: &Trade, y_leg: &Trade) -> bool {
    match spread_bs {
        BuySell::Sell => x_leg.buy_sell == BuySell::Sell && y_leg.buy_sell == BuySell::Buy,
        BuySell::Buy => x_leg.buy_sell == BuySell::Buy && y_leg.buy_sell == BuySell::Sell,
    }
}

/// Scenario A: N exchange rows on one product leg (identical price/B-S/
/// month) aggregate to the quantity of a single trader spread pair; the
/// other leg is a single exchange row.
fn scenario_a(pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
    let confidence = cfg.product_spread_confidence_tiers.1;
    let exchange = pool.unmatched_exchange_snapshot();
    let trader = pool.unmatched_trader_snapshot();
    let mut matches = Vec::new();

    for t_x in &trader {
        for t_y in &trader {
            if t_x.id == t_y.id || t_x.product() == t_y.product() || t_x.contract_month != t_y.contract_month {
                continue;
            }
            if t_x.quantity_mt() != t_y.quantity_mt() {
                continue;
            }
            if !universal_and_option_ok(t_x, t_y, &cfg.universal_matching_fields) {
                continue;
            }
            let spread_bs = if !t_x.price.is_zero() { t_x.buy_sell } else { t_y.buy_sell };
            let spread_price = if !t_x.price.is_zero() {
                t_x.price - t_y.price
            } else if !t_y.price.is_zero() {
                t_x.price - t_y.price
            } else {
                continue;
            };

            let x_bucket: Vec<&Trade> = exchange
                .iter()
                .filter(|e| {
                    pool.available_exchange(&e.id).is_some()
                        && e.product() == t_x.product()
                        && e.contract_month == t_x.contract_month
                        && universal_and_option_ok(e, t_x, &cfg.universal_matching_fields)
                })
                .collect();
            if x_bucket.len() < 2 {
                continue;
            }
            if !x_bucket.iter().all(|e| e.buy_sell == x_bucket[0].buy_sell) {
                continue;
            }
            let x_sum: Decimal = x_bucket.iter().map(|e| e.quantity_mt()).sum();
            if x_sum != t_x.quantity_mt() {
                continue;
            }

            let Some(y_single) = exchange.iter().find(|e| {
                pool.available_exchange(&e.id).is_some()
                    && e.product() == t_y.product()
                    && e.contract_month == t_y.contract_month
                    && e.quantity_mt() == t_y.quantity_mt()
                    && universal_and_option_ok(e, t_y, &cfg.universal_matching_fields)
            }) else {
                continue;
            };

            if !direction_ok(spread_bs, x_bucket[0], y_single) {
                continue;
            }
            if x_bucket[0].price - y_single.price != spread_price {
                continue;
            }

            let (x_primary, x_rest) = x_bucket.split_first().expect("bucket len >= 2");
            let candidate = MatchCandidate {
                rule_number: 13,
                match_type: MatchType::AggregatedProductSpread,
                confidence,
                trader_primary: t_x.id.clone(),
                exchange_primary: x_primary.id.clone(),
                trader_additional: vec![t_y.id.clone()],
                exchange_additional: x_rest.iter().map(|e| e.id.clone()).chain(std::iter::once(y_single.id.clone())).collect(),
                matched_fields: vec!["contract_month".into(), "quantity".into(), "buy_sell".into(), "price".into()],
                tolerances_applied: IndexMap::new(),
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }
    }
    matches
}

/// Scenario B: a hyphenated exchange spread row vs. multiple trader rows
/// per component, aggregating per product to match the exchange quantity.
fn scenario_b(pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
    let confidence = cfg.product_spread_confidence_tiers.0;
    let exchange = pool.unmatched_exchange_snapshot();
    let trader = pool.unmatched_trader_snapshot();
    let mut matches = Vec::new();

    for exch in &exchange {
        let Some((x, y)) = Trade::split_hyphenated(exch.product()) else {
            continue;
        };

        let x_bucket: Vec<&Trade> = trader
            .iter()
            .filter(|t| pool.available_trader(&t.id).is_some() && t.product() == x && t.contract_month == exch.contract_month)
            .collect();
        let y_bucket: Vec<&Trade> = trader
            .iter()
            .filter(|t| pool.available_trader(&t.id).is_some() && t.product() == y && t.contract_month == exch.contract_month)
            .collect();
        if x_bucket.len() + y_bucket.len() < 3 {
            continue;
        }
        let x_sum: Decimal = x_bucket.iter().map(|t| t.quantity_mt()).sum();
        let y_sum: Decimal = y_bucket.iter().map(|t| t.quantity_mt()).sum();
        if x_sum != exch.quantity_mt() || y_sum != exch.quantity_mt() {
            continue;
        }
        if x_bucket.is_empty() || y_bucket.is_empty() {
            continue;
        }
        if !x_bucket.iter().all(|t| t.buy_sell == x_bucket[0].buy_sell) || !y_bucket.iter().all(|t| t.buy_sell == y_bucket[0].buy_sell) {
            continue;
        }
        if !direction_ok(exch.buy_sell, x_bucket[0], y_bucket[0]) {
            continue;
        }

        let (x_primary, x_rest) = x_bucket.split_first().expect("non-empty");
        let (y_primary, y_rest) = y_bucket.split_first().expect("non-empty");

        let candidate = MatchCandidate {
            rule_number: 13,
            match_type: MatchType::AggregatedProductSpread,
            confidence,
            trader_primary: x_primary.id.clone(),
            exchange_primary: exch.id.clone(),
            trader_additional: x_rest.iter().map(|t| t.id.clone()).chain(std::iter::once(y_primary.id.clone())).chain(y_rest.iter().map(|t| t.id.clone())).collect(),
            exchange_additional: vec![],
            matched_fields: vec!["contract_month".into(), "quantity".into(), "buy_sell".into(), "price".into()],
            tolerances_applied: IndexMap::new(),
        };
        if let Ok(result) = pool.record_match(candidate) {
            matches.push(result);
        }
    }
    matches
}

/// Scenario C (cross-spread): several trader spread pairs sharing a
/// contract month aggregate per product *across pairs* — not merely across
/// legs of one pair — to match two plain (non-hyphenated, non-aggregated)
/// exchange rows on distinct products. The spread-quantity invariant (both
/// aggregated product totals equal) stands in for rule 5's per-pair
/// quantity match, and rule 5's direction/price logic applies to the
/// aggregated totals.
fn scenario_c(pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
    let confidence = cfg.product_spread_confidence_tiers.2;
    let exchange = pool.unmatched_exchange_snapshot();
    let trader = pool.unmatched_trader_snapshot();
    let mut matches = Vec::new();

    let mut months: Vec<crate::month::ContractMonth> = trader.iter().map(|t| t.contract_month).collect();
    months.sort();
    months.dedup();

    for month in months {
        let rows: Vec<&Trade> = trader.iter().filter(|t| t.contract_month == month).collect();
        let mut products: Vec<&str> = rows.iter().map(|t| t.product()).collect();
        products.sort_unstable();
        products.dedup();
        if products.len() < 2 {
            continue;
        }

        for i in 0..products.len() {
            for j in 0..products.len() {
                if i == j {
                    continue;
                }
                let (x_product, y_product) = (products[i], products[j]);
                let x_bucket: Vec<&Trade> = rows.iter().copied().filter(|t| t.product() == x_product).collect();
                let y_bucket: Vec<&Trade> = rows.iter().copied().filter(|t| t.product() == y_product).collect();
                // Cross-pair aggregation needs at least 3 legs total — 2+2 complete
                // pairs collapsing to a single leg per side is rule 5's territory.
                if x_bucket.len() + y_bucket.len() < 3 {
                    continue;
                }
                if x_bucket.is_empty() || y_bucket.is_empty() {
                    continue;
                }
                if !x_bucket.iter().all(|t| t.buy_sell == x_bucket[0].buy_sell) || !y_bucket.iter().all(|t| t.buy_sell == y_bucket[0].buy_sell) {
                    continue;
                }
                if !universal_and_option_ok(x_bucket[0], y_bucket[0], &cfg.universal_matching_fields) {
                    continue;
                }

                let x_sum: Decimal = x_bucket.iter().map(|t| t.quantity_mt()).sum();
                let y_sum: Decimal = y_bucket.iter().map(|t| t.quantity_mt()).sum();
                if x_sum != y_sum {
                    continue;
                }

                let spread_leg = x_bucket
                    .iter()
                    .chain(y_bucket.iter())
                    .find(|t| !t.price.is_zero());
                let Some(spread_leg) = spread_leg else { continue };
                let spread_bs = if spread_leg.product() == x_product { spread_leg.buy_sell } else { spread_leg.buy_sell.opposite() };
                let spread_price = if spread_leg.product() == x_product {
                    spread_leg.price
                } else {
                    -spread_leg.price
                };

                let Some(x_exch) = exchange.iter().find(|e| {
                    pool.available_exchange(&e.id).is_some()
                        && e.product() == x_product
                        && e.contract_month == month
                        && e.quantity_mt() == x_sum
                        && universal_and_option_ok(e, x_bucket[0], &cfg.universal_matching_fields)
                }) else {
                    continue;
                };
                let Some(y_exch) = exchange.iter().find(|e| {
                    pool.available_exchange(&e.id).is_some()
                        && e.id != x_exch.id
                        && e.product() == y_product
                        && e.contract_month == month
                        && e.quantity_mt() == y_sum
                        && universal_and_option_ok(e, y_bucket[0], &cfg.universal_matching_fields)
                }) else {
                    continue;
                };

                if !direction_ok(spread_bs, x_exch, y_exch) {
                    continue;
                }
                if x_exch.price - y_exch.price != spread_price {
                    continue;
                }

                let (x_primary, x_rest) = x_bucket.split_first().expect("non-empty");
                let candidate = MatchCandidate {
                    rule_number: 13,
                    match_type: MatchType::AggregatedProductSpread,
                    confidence,
                    trader_primary: x_primary.id.clone(),
                    exchange_primary: x_exch.id.clone(),
                    trader_additional: x_rest
                        .iter()
                        .map(|t| t.id.clone())
                        .chain(y_bucket.iter().map(|t| t.id.clone()))
                        .collect(),
                    exchange_additional: vec![y_exch.id.clone()],
                    matched_fields: vec!["contract_month".into(), "quantity".into(), "buy_sell".into(), "price".into()],
                    tolerances_applied: IndexMap::new(),
                };
                if let Ok(result) = pool.record_match(candidate) {
                    matches.push(result);
                }
            }
        }
    }
    matches
}

impl Matcher for AggregatedProductSpreadMatcher {
    fn rule_number(&self) -> u8 {
        13
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let mut matches = scenario_a(pool, cfg);
        matches.extend(scenario_b(pool, cfg));
        matches.extend(scenario_c(pool, cfg));
        info!(rule = 13, matches = matches.len(), "aggregated product spread matching complete");
        matches
    }
}
