//! Rule 9 — AGGREGATED SPREAD (confidence per config). Grounds on
//! `original_source/ice_match/matchers/aggregated_spread_matcher.py`:
//! aggregates exchange rows per contract month into a virtual leg sharing
//! `(price, buy_sell, universal_fields)`, then applies rule 2's spread
//! predicate over the virtual legs instead of raw rows.

use super::Matcher;
use super::rule2_spread::{find_spread_pairs, SpreadPair, SpreadTier};
use super::support::universal_and_option_ok;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::trade::Trade;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::info;

pub struct AggregatedSpreadMatcher;

/// A virtual exchange leg: the aggregated quantity/price of a
/// `(contract_month, price, buy_sell, universal_fields)` bucket, carrying
/// the member trade ids so a match can still be recorded leg-by-leg.
struct VirtualLeg {
    representative: Trade,
    member_ids: Vec<crate::ids::TradeId>,
}

fn build_virtual_legs(exchange: &[Trade], cfg: &Config) -> Vec<VirtualLeg> {
    let mut groups: IndexMap<(crate::month::ContractMonth, Decimal, &str), Vec<&Trade>> = IndexMap::new();
    for trade in exchange {
        let bs_tag = if trade.buy_sell == crate::trade::BuySell::Buy { "B" } else { "S" };
        groups.entry((trade.contract_month, trade.price, bs_tag)).or_default().push(trade);
    }

    let mut legs = Vec::new();
    for bucket in groups.values() {
        if bucket.len() < 2 {
            continue;
        }
        let all_universal_ok = bucket.windows(2).all(|w| universal_and_option_ok(w[0], w[1], &cfg.universal_matching_fields));
        if !all_universal_ok {
            continue;
        }
        let total_mt: Decimal = bucket.iter().map(|t| t.quantity_mt()).sum();
        let ratio = cfg.ratio_for(bucket[0].product());
        let representative = bucket[0].with_aggregated_mt_quantity(total_mt, ratio);
        legs.push(VirtualLeg {
            representative,
            member_ids: bucket.iter().map(|t| t.id.clone()).collect(),
        });
    }
    legs
}

impl Matcher for AggregatedSpreadMatcher {
    fn rule_number(&self) -> u8 {
        9
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let universal = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(9);

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
        let virtual_legs = build_virtual_legs(&exchange_snapshot, cfg);
        let virtual_trades: Vec<Trade> = virtual_legs.iter().map(|l| l.representative.clone()).collect();
        let virtual_pairs: Vec<SpreadPair> = find_spread_pairs(&virtual_trades, universal, SpreadTier::ProductQuantity, |_, _| true);

        let member_lookup: IndexMap<crate::ids::TradeId, &VirtualLeg> = virtual_legs.iter().map(|l| (l.representative.id.clone(), l)).collect();

        let mut matches = Vec::new();
        for trader_pair in &trader_pairs {
            let Some(vp) = virtual_pairs.iter().find(|ep| {
                ep.early.contract_month == trader_pair.early.contract_month
                    && ep.late.contract_month == trader_pair.late.contract_month
                    && ep.early.buy_sell == trader_pair.early.buy_sell
                    && ep.late.buy_sell == trader_pair.late.buy_sell
                    && (ep.early.price - ep.late.price) == trader_pair.spread_price()
            }) else {
                continue;
            };

            let Some(early_leg) = member_lookup.get(&vp.early.id) else { continue };
            let Some(late_leg) = member_lookup.get(&vp.late.id) else { continue };

            let (early_primary, early_rest) = early_leg.member_ids.split_first().expect("bucket len >= 2");
            let exchange_additional: Vec<_> = early_rest.iter().cloned().chain(late_leg.member_ids.iter().cloned()).collect();

            let candidate = MatchCandidate {
                rule_number: 9,
                match_type: MatchType::AggregatedSpread,
                confidence,
                trader_primary: trader_pair.early.id.clone(),
                exchange_primary: early_primary.clone(),
                trader_additional: vec![trader_pair.late.id.clone()],
                exchange_additional,
                matched_fields: vec!["product".into(), "contract_month".into(), "buy_sell".into(), "price".into()],
                tolerances_applied: IndexMap::new(),
            };
            if let Ok(result) = pool.record_match(candidate) {
                matches.push(result);
            }
        }

        info!(rule = 9, matches = matches.len(), "aggregated spread matching complete");
        matches
    }
}
