//! Rule 4 — COMPLEX CRACK (confidence ≈90). Grounds on
//! `original_source/energy_match/matchers/complex_crack_matcher.py`: a
//! trader crack row pairs with two exchange rows — the base product and
//! "brent swap" — on the same contract month and universal fields.
//!
//! Per `DESIGN.md` Open Question 4, the price check uses spec §4.4's exact
//! formula with banker's rounding at the intermediate division
//! (`rust_decimal`'s `RoundingStrategy::MidpointNearestEven`), superseding
//! the Python original's tolerance-based comparison.

use super::Matcher;
use super::support::abs_diff;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::trade::{BuySell, Trade};
use indexmap::IndexMap;
use rust_decimal::RoundingStrategy;
use tracing::info;

pub struct ComplexCrackMatcher;

fn same_month_and_universal(a: &Trade, b: &Trade, cfg: &Config) -> bool {
    a.contract_month == b.contract_month
        && super::support::universal_and_option_ok(a, b, &cfg.universal_matching_fields)
}

/// Sell crack ≡ sell base + buy brent; buy crack ≡ buy base + sell brent.
pub(crate) fn direction_ok(crack: &Trade, base: &Trade, brent: &Trade) -> bool {
    match crack.buy_sell {
        BuySell::Sell => base.buy_sell == BuySell::Sell && brent.buy_sell == BuySell::Buy,
        BuySell::Buy => base.buy_sell == BuySell::Buy && brent.buy_sell == BuySell::Sell,
    }
}

impl Matcher for ComplexCrackMatcher {
    fn rule_number(&self) -> u8 {
        4
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let confidence = cfg.confidence_for(4);
        let exchange = pool.unmatched_exchange_snapshot();
        let trader: Vec<Trade> = pool
            .unmatched_trader_snapshot()
            .into_iter()
            .filter(|t| t.is_crack())
            .collect();

        let mut matches = Vec::new();
        for crack_trade in &trader {
            let Some(base_product) = crack_trade.base_product() else {
                continue;
            };
            let ratio = cfg.ratio_for(crack_trade.product());

            let bases: Vec<&Trade> = exchange
                .iter()
                .filter(|e| {
                    pool.available_exchange(&e.id).is_some()
                        && e.product() == base_product
                        && same_month_and_universal(crack_trade, e, cfg)
                })
                .collect();
            let brents: Vec<&Trade> = exchange
                .iter()
                .filter(|e| {
                    pool.available_exchange(&e.id).is_some()
                        && e.product() == "brent swap"
                        && same_month_and_universal(crack_trade, e, cfg)
                })
                .collect();

            let mut commit = None;
            'search: for base in &bases {
                for brent in &brents {
                    if base.id == brent.id {
                        continue;
                    }
                    if !direction_ok(crack_trade, base, brent) {
                        continue;
                    }
                    if abs_diff(crack_trade.quantity_mt(), base.quantity_mt()) > cfg.universal_tolerance_mt {
                        continue;
                    }
                    let expected_brent_bbl = crack_trade.quantity_mt() * ratio;
                    if abs_diff(expected_brent_bbl, brent.quantity_bbl()) > cfg.universal_tolerance_bbl {
                        continue;
                    }
                    let intermediate = (base.price / ratio).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);
                    let calculated_crack_price = intermediate - brent.price;
                    if calculated_crack_price != crack_trade.price {
                        continue;
                    }
                    commit = Some((base.id.clone(), brent.id.clone()));
                    break 'search;
                }
            }

            let Some((base_id, brent_id)) = commit else {
                continue;
            };

            let mut tolerances = IndexMap::new();
            tolerances.insert("quantity_mt".to_string(), cfg.universal_tolerance_mt);
            tolerances.insert("quantity_bbl".to_string(), cfg.universal_tolerance_bbl);

            let candidate = MatchCandidate {
                rule_number: 4,
                match_type: MatchType::ComplexCrack,
                confidence,
                trader_primary: crack_trade.id.clone(),
                exchange_primary: base_id,
                trader_additional: vec![],
                exchange_additional: vec![brent_id],
                matched_fields: vec![
                    "product".into(),
                    "contract_month".into(),
                    "quantity".into(),
                    "buy_sell".into(),
                    "price".into(),
                ],
                tolerances_applied: tolerances,
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }

        info!(rule = 4, matches = matches.len(), "complex crack matching complete");
        matches
    }
}
