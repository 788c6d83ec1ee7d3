//! Rule 5 — PRODUCT SPREAD (confidence ≈90). Grounds on
//! `original_source/ice_match/matchers/product_spread_matcher.py`: a spread
//! across two distinct products rather than two months. Two independent
//! paths — hyphenated single exchange row, or two explicit exchange rows —
//! both validated against two trader rows.

use super::Matcher;
use super::support::universal_and_option_ok;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::trade::{BuySell, Trade};
use indexmap::IndexMap;
use tracing::info;

pub struct ProductSpreadMatcher;

fn direction_ok(spread_bs: BuySell, x_leg: &Trade, y_leg: &Trade) -> bool {
    match spread_bs {
        BuySell::Sell => x_leg.buy_sell == BuySell::Sell && y_leg.buy_sell == BuySell::Buy,
        BuySell::Buy => x_leg.buy_sell == BuySell::Buy && y_leg.buy_sell == BuySell::Sell,
    }
}

/// Finds the two trader rows forming the other half of a product spread:
/// same month, same quantity, opposite B/S, one priced at `spread_price`
/// (or either, if both zero) and the other at zero, on products `x`/`y`.
fn find_trader_pair<'t>(
    trader: &'t [Trade],
    x: &str,
    y: &str,
    month: crate::month::ContractMonth,
    quantity: rust_decimal::Decimal,
    spread_price: rust_decimal::Decimal,
    spread_bs: BuySell,
    cfg: &Config,
) -> Option<(&'t Trade, &'t Trade)> {
    for x_leg in trader.iter().filter(|t| t.product() == x && t.contract_month == month && t.quantity_mt() == quantity) {
        for y_leg in trader.iter().filter(|t| t.product() == y && t.contract_month == month && t.quantity_mt() == quantity) {
            if x_leg.id == y_leg.id {
                continue;
            }
            if !universal_and_option_ok(x_leg, y_leg, &cfg.universal_matching_fields) {
                continue;
            }
            if !direction_ok(spread_bs, x_leg, y_leg) {
                continue;
            }
            let priced_ok = (x_leg.price == spread_price && y_leg.price.is_zero())
                || (y_leg.price == spread_price && x_leg.price.is_zero());
            if priced_ok {
                return Some((x_leg, y_leg));
            }
        }
    }
    None
}

fn hyphenated_path(pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
    let confidence = cfg.confidence_for(5);
    let exchange = pool.unmatched_exchange_snapshot();
    let trader = pool.unmatched_trader_snapshot();
    let mut matches = Vec::new();

    for exch in &exchange {
        let Some((x, y)) = Trade::split_hyphenated(exch.product()) else {
            continue;
        };
        let Some((x_leg, y_leg)) = find_trader_pair(&trader, x, y, exch.contract_month, exch.quantity_mt(), exch.price, exch.buy_sell, cfg)
        else {
            continue;
        };

        let candidate = MatchCandidate {
            rule_number: 5,
            match_type: MatchType::ProductSpread,
            confidence,
            trader_primary: x_leg.id.clone(),
            exchange_primary: exch.id.clone(),
            trader_additional: vec![y_leg.id.clone()],
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

fn two_leg_path(pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
    let confidence = cfg.confidence_for(5);
    let exchange = pool.unmatched_exchange_snapshot();
    let trader = pool.unmatched_trader_snapshot();
    let mut matches = Vec::new();

    for i in 0..exchange.len() {
        for j in 0..exchange.len() {
            if i == j {
                continue;
            }
            let x_exch = &exchange[i];
            let y_exch = &exchange[j];
            if x_exch.product() == y_exch.product() {
                continue;
            }
            if x_exch.contract_month != y_exch.contract_month {
                continue;
            }
            if x_exch.quantity_mt() != y_exch.quantity_mt() {
                continue;
            }
            if x_exch.buy_sell == y_exch.buy_sell {
                continue;
            }
            if !universal_and_option_ok(x_exch, y_exch, &cfg.universal_matching_fields) {
                continue;
            }
            let exchange_differential = x_exch.price - y_exch.price;
            let Some((x_leg, y_leg)) = find_trader_pair(
                &trader,
                x_exch.product(),
                y_exch.product(),
                x_exch.contract_month,
                x_exch.quantity_mt(),
                exchange_differential,
                x_exch.buy_sell,
                cfg,
            ) else {
                continue;
            };

            if pool.available_exchange(&x_exch.id).is_none() || pool.available_exchange(&y_exch.id).is_none() {
                continue;
            }

            let candidate = MatchCandidate {
                rule_number: 5,
                match_type: MatchType::ProductSpread,
                confidence,
                trader_primary: x_leg.id.clone(),
                exchange_primary: x_exch.id.clone(),
                trader_additional: vec![y_leg.id.clone()],
                exchange_additional: vec![y_exch.id.clone()],
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

impl Matcher for ProductSpreadMatcher {
    fn rule_number(&self) -> u8 {
        5
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let mut matches = hyphenated_path(pool, cfg);
        matches.extend(two_leg_path(pool, cfg));
        info!(rule = 5, matches = matches.len(), "product spread matching complete");
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TradeId;
    use crate::month::ContractMonth;
    use crate::trade::{Side, TradeInput, Unit};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn mk(id: &str, source: Side, product: &str, bs: BuySell, price: Decimal) -> Trade {
        Trade::new(
            TradeInput {
                id: TradeId::from(id),
                source,
                product: product.into(),
                contract_month: ContractMonth::parse("Apr-25").unwrap(),
                quantity: dec!(1000),
                unit: Unit::Mt,
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
            },
            dec!(7),
        )
        .unwrap()
    }

    #[test]
    fn scenario_s6_hyphenated_product_spread() {
        let mut pool = Pool::new(
            vec![
                mk("t1", Side::Trader, "X", BuySell::Sell, dec!(1.2)),
                mk("t2", Side::Trader, "Y", BuySell::Buy, dec!(0)),
            ],
            vec![mk("e1", Side::Exchange, "X-Y", BuySell::Sell, dec!(1.2))],
        );
        let cfg = Config::default();
        let matches = ProductSpreadMatcher.run(&mut pool, &cfg);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::ProductSpread);
        assert!(pool.validate_integrity());
    }

    #[test]
    fn two_leg_path_matches_distinct_exchange_rows() {
        let mut pool = Pool::new(
            vec![
                mk("t1", Side::Trader, "X", BuySell::Sell, dec!(1.2)),
                mk("t2", Side::Trader, "Y", BuySell::Buy, dec!(0)),
            ],
            vec![
                mk("e1", Side::Exchange, "X", BuySell::Sell, dec!(82.5)),
                mk("e2", Side::Exchange, "Y", BuySell::Buy, dec!(81.3)),
            ],
        );
        let cfg = Config::default();
        let matches = ProductSpreadMatcher.run(&mut pool, &cfg);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].exchange_additional.len(), 1);
    }
}
