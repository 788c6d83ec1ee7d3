//! Rule 12 — COMPLEX CRACK ROLL (confidence per config). Grounds on
//! `original_source/energy_match/matchers/complex_crack_roll_matcher.py`:
//! two consecutive trader crack rows, priced as a roll, against two
//! complete rule-4 crack positions (base + brent swap) on the two months.

use super::Matcher;
use super::rule4_complex_crack::direction_ok;
use super::support::abs_diff;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::trade::{Trade, UniversalField};
use indexmap::IndexMap;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::info;

pub struct ComplexCrackRollMatcher;

fn same_month_and_universal(a: &Trade, b: &Trade, fields: &[UniversalField]) -> bool {
    a.contract_month == b.contract_month && super::support::universal_and_option_ok(a, b, fields)
}

/// Finds a base+brent exchange position on `crack.contract_month`
/// consistent with `crack`'s direction/quantity, per rule 4's predicate.
fn find_position<'t>(crack: &Trade, exchange: &'t [Trade], pool: &Pool, cfg: &Config) -> Option<(&'t Trade, &'t Trade, Decimal)> {
    let base_product = crack.base_product()?;
    let ratio = cfg.ratio_for(crack.product());
    let fields = &cfg.universal_matching_fields;

    let bases = exchange
        .iter()
        .filter(|e| pool.available_exchange(&e.id).is_some() && e.product() == base_product && same_month_and_universal(crack, e, fields));
    for base in bases {
        let brents = exchange.iter().filter(|e| {
            pool.available_exchange(&e.id).is_some() && e.product() == "brent swap" && same_month_and_universal(crack, e, fields) && e.id != base.id
        });
        for brent in brents {
            if !direction_ok(crack, base, brent) {
                continue;
            }
            if abs_diff(crack.quantity_mt(), base.quantity_mt()) > cfg.universal_tolerance_mt {
                continue;
            }
            let expected_brent_bbl = crack.quantity_mt() * ratio;
            if abs_diff(expected_brent_bbl, brent.quantity_bbl()) > cfg.universal_tolerance_bbl {
                continue;
            }
            let crack_price = (base.price / ratio).round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven) - brent.price;
            return Some((base, brent, crack_price));
        }
    }
    None
}

impl Matcher for ComplexCrackRollMatcher {
    fn rule_number(&self) -> u8 {
        12
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let fields = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(12);

        let trader: Vec<Trade> = pool.unmatched_trader_snapshot().into_iter().filter(|t| t.is_crack()).collect();
        let exchange = pool.unmatched_exchange_snapshot();

        let mut used = std::collections::HashSet::new();
        let mut matches = Vec::new();

        for i in 0..trader.len() {
            if used.contains(&i) {
                continue;
            }
            for j in (i + 1)..trader.len() {
                if used.contains(&j) {
                    continue;
                }
                let (earlier_idx, later_idx) = if trader[i].contract_month <= trader[j].contract_month {
                    (i, j)
                } else {
                    (j, i)
                };
                let earlier = &trader[earlier_idx];
                let later = &trader[later_idx];
                if earlier.product() != later.product() || earlier.contract_month == later.contract_month {
                    continue;
                }
                if earlier.buy_sell == later.buy_sell {
                    continue;
                }
                if !same_month_and_universal_ignore_month(earlier, later, fields) {
                    continue;
                }
                let roll_price = if !earlier.price.is_zero() {
                    earlier.price
                } else {
                    later.price
                };
                if earlier.price.is_zero() && later.price.is_zero() {
                    continue;
                }

                let Some((base_early, brent_early, crack_price_early)) = find_position(earlier, &exchange, pool, cfg) else {
                    continue;
                };
                let Some((base_late, brent_late, crack_price_late)) = find_position(later, &exchange, pool, cfg) else {
                    continue;
                };
                if crack_price_early - crack_price_late != roll_price {
                    continue;
                }

                let exchange_ids = [base_early.id.clone(), brent_early.id.clone(), base_late.id.clone(), brent_late.id.clone()];
                if exchange_ids.iter().collect::<std::collections::HashSet<_>>().len() != 4 {
                    continue;
                }

                used.insert(earlier_idx);
                used.insert(later_idx);

                let mut tolerances = IndexMap::new();
                tolerances.insert("quantity_mt".to_string(), cfg.universal_tolerance_mt);
                tolerances.insert("quantity_bbl".to_string(), cfg.universal_tolerance_bbl);

                let candidate = MatchCandidate {
                    rule_number: 12,
                    match_type: MatchType::ComplexCrackRoll,
                    confidence,
                    trader_primary: earlier.id.clone(),
                    exchange_primary: exchange_ids[0].clone(),
                    trader_additional: vec![later.id.clone()],
                    exchange_additional: exchange_ids[1..].to_vec(),
                    matched_fields: vec!["product".into(), "contract_month".into(), "buy_sell".into(), "price".into()],
                    tolerances_applied: tolerances,
                };
                if let Ok(result) = pool.record_match(candidate) {
                    matches.push(result);
                }
                break;
            }
        }

        info!(rule = 12, matches = matches.len(), "complex crack roll matching complete");
        matches
    }
}

fn same_month_and_universal_ignore_month(a: &Trade, b: &Trade, fields: &[UniversalField]) -> bool {
    super::support::universal_and_option_ok(a, b, fields)
}
