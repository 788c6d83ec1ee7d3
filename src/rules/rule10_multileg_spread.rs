//! Rule 10 — MULTILEG SPREAD (confidence per config). Grounds on
//! `original_source/ice_match/matchers/multileg_spread_matcher.py`: chains
//! two or three rule-2-style exchange spreads whose internal months net
//! out, matching a trader spread on the chain's outer months.

use super::Matcher;
use super::rule2_spread::{exchange_spread_pairs, find_spread_pairs, SpreadPair, SpreadTier};
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::trade::Trade;
use indexmap::IndexMap;
use itertools::Itertools;
use rust_decimal::Decimal;
use tracing::info;

pub struct MultilegSpreadMatcher;

/// A 2- or 3-spread chain with internal legs netted out, carrying the
/// trade ids of every leg (outer + internal) for commit purposes.
struct Chain {
    outer_early_month: crate::month::ContractMonth,
    outer_late_month: crate::month::ContractMonth,
    outer_early_bs: crate::trade::BuySell,
    net_price: Decimal,
    leg_ids: Vec<crate::ids::TradeId>,
}

/// Tier-1: A/B + B/C chains into A/C if the B legs have opposite B/S
/// (they net to nothing but a price carry).
fn two_spread_chains(pairs: &[SpreadPair]) -> Vec<Chain> {
    let mut chains = Vec::new();
    for (p1, p2) in pairs.iter().tuple_combinations() {
        let (ab, bc) = if p1.late.contract_month == p2.early.contract_month {
            (p1, p2)
        } else if p2.late.contract_month == p1.early.contract_month {
            (p2, p1)
        } else {
            continue;
        };
        if ab.late.buy_sell == bc.early.buy_sell {
            continue;
        }
        if ab.early.contract_month == bc.late.contract_month {
            continue;
        }
        chains.push(Chain {
            outer_early_month: ab.early.contract_month,
            outer_late_month: bc.late.contract_month,
            outer_early_bs: ab.early.buy_sell,
            net_price: ab.price_differential() + bc.price_differential(),
            leg_ids: vec![
                ab.early.id.clone(),
                ab.late.id.clone(),
                bc.early.id.clone(),
                bc.late.id.clone(),
            ],
        });
    }
    chains
}

/// Tier-2: A/B + B/C + C/D nets into A/D, chained step by step.
fn three_spread_chains(pairs: &[SpreadPair]) -> Vec<Chain> {
    let mut chains = Vec::new();
    for combo in pairs.iter().permutations(3) {
        let (ab, bc, cd) = (combo[0], combo[1], combo[2]);
        if ab.late.contract_month != bc.early.contract_month {
            continue;
        }
        if bc.late.contract_month != cd.early.contract_month {
            continue;
        }
        if ab.late.buy_sell == bc.early.buy_sell {
            continue;
        }
        if bc.late.buy_sell == cd.early.buy_sell {
            continue;
        }
        if ab.early.contract_month == cd.late.contract_month {
            continue;
        }
        chains.push(Chain {
            outer_early_month: ab.early.contract_month,
            outer_late_month: cd.late.contract_month,
            outer_early_bs: ab.early.buy_sell,
            net_price: ab.price_differential() + bc.price_differential() + cd.price_differential(),
            leg_ids: vec![
                ab.early.id.clone(),
                ab.late.id.clone(),
                bc.early.id.clone(),
                bc.late.id.clone(),
                cd.early.id.clone(),
                cd.late.id.clone(),
            ],
        });
    }
    chains
}

impl Matcher for MultilegSpreadMatcher {
    fn rule_number(&self) -> u8 {
        10
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let universal = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(10);

        let trader_snapshot = pool.unmatched_trader_snapshot();
        let mut trader_groups: IndexMap<(String, Decimal), Vec<Trade>> = IndexMap::new();
        for trade in trader_snapshot {
            trader_groups.entry((trade.product().to_string(), trade.quantity_mt().normalize())).or_default().push(trade);
        }
        let mut trader_pairs = Vec::new();
        for group in trader_groups.values() {
            trader_pairs.extend(find_spread_pairs(group, universal, SpreadTier::TraderSide, |a, b| {
                a.spread_flag.as_deref() == Some("S") || b.spread_flag.as_deref() == Some("S") || a.price.is_zero() || b.price.is_zero() || a.price == b.price
            }));
        }

        let exchange_snapshot = pool.unmatched_exchange_snapshot();
        let exchange_pairs = exchange_spread_pairs(&exchange_snapshot, universal, &trader_pairs);

        let mut chains = two_spread_chains(&exchange_pairs);
        chains.extend(three_spread_chains(&exchange_pairs));

        let mut matches = Vec::new();
        for trader_pair in &trader_pairs {
            let Some(idx) = chains.iter().position(|c| {
                c.outer_early_month == trader_pair.early.contract_month
                    && c.outer_late_month == trader_pair.late.contract_month
                    && c.outer_early_bs == trader_pair.early.buy_sell
                    && c.net_price == trader_pair.spread_price()
            }) else {
                continue;
            };
            let chain = chains.remove(idx);
            if !chain.leg_ids.iter().all(|id| pool.available_exchange(id).is_some()) {
                continue;
            }

            let (exchange_primary, exchange_additional) = chain.leg_ids.split_first().expect("chain has legs");
            let candidate = MatchCandidate {
                rule_number: 10,
                match_type: MatchType::MultilegSpread,
                confidence,
                trader_primary: trader_pair.early.id.clone(),
                exchange_primary: exchange_primary.clone(),
                trader_additional: vec![trader_pair.late.id.clone()],
                exchange_additional: exchange_additional.to_vec(),
                matched_fields: vec!["product".into(), "contract_month".into(), "buy_sell".into(), "price".into()],
                tolerances_applied: IndexMap::new(),
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }

        info!(rule = 10, matches = matches.len(), "multileg spread matching complete");
        matches
    }
}
