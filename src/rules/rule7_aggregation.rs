//! Rule 7 — AGGREGATION (confidence per config). Grounds on
//! `original_source/ice_match/matchers/aggregation_matcher.py`: one side's
//! rows under `(product, contract_month, price, buy_sell, universal_fields)`
//! sum exactly (no tolerance) to a single row on the other side. Both
//! directions are attempted; minimum aggregation size is 2.

use super::Matcher;
use crate::config::Config;
use crate::match_result::{MatchResult, MatchType};
use crate::pool::{MatchCandidate, Pool};
use crate::signature::{SigValue, Signature};
use crate::trade::{Trade, UniversalField};
use fnv::FnvBuildHasher;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use tracing::info;

pub struct AggregationMatcher;

fn key(trade: &Trade, universal: &[UniversalField]) -> Signature {
    let rule_fields = vec![
        SigValue::from(trade.product()),
        SigValue::from(trade.contract_month.to_string().as_str()),
        SigValue::from(trade.price),
        SigValue::from(trade.buy_sell.to_string().as_str()),
    ];
    Signature::new(rule_fields, trade, universal)
}

fn group_by_key(trades: Vec<Trade>, universal: &[UniversalField]) -> IndexMap<Signature, Vec<Trade>, FnvBuildHasher> {
    let mut groups: IndexMap<Signature, Vec<Trade>, FnvBuildHasher> = IndexMap::default();
    for trade in trades {
        groups.entry(key(&trade, universal)).or_default().push(trade);
    }
    groups
}

impl Matcher for AggregationMatcher {
    fn rule_number(&self) -> u8 {
        7
    }

    fn run(&self, pool: &mut Pool, cfg: &Config) -> Vec<MatchResult> {
        let universal = &cfg.universal_matching_fields;
        let confidence = cfg.confidence_for(7);

        let trader_groups = group_by_key(pool.unmatched_trader_snapshot(), universal);
        let exchange_groups = group_by_key(pool.unmatched_exchange_snapshot(), universal);

        let mut matches = Vec::new();
        let keys: Vec<Signature> = trader_groups.keys().cloned().collect();
        for sig in keys {
            let Some(trader_bucket) = trader_groups.get(&sig) else { continue };
            let Some(exchange_bucket) = exchange_groups.get(&sig) else { continue };

            let trader_sum: Decimal = trader_bucket.iter().map(|t| t.quantity_mt()).sum();
            let exchange_sum: Decimal = exchange_bucket.iter().map(|t| t.quantity_mt()).sum();

            let candidate = if trader_bucket.len() >= 2 && exchange_bucket.len() == 1 && trader_sum == exchange_sum {
                Some(build_candidate(trader_bucket, exchange_bucket, confidence))
            } else if exchange_bucket.len() >= 2 && trader_bucket.len() == 1 && trader_sum == exchange_sum {
                Some(build_candidate(trader_bucket, exchange_bucket, confidence))
            } else {
                None
            };

            let Some(candidate) = candidate else { continue };
            if all_still_available(pool, &candidate) {
                if let Ok(result) = pool.record_match(candidate) {
                    matches.push(result);
                }
            }
        }

        info!(rule = 7, matches = matches.len(), "aggregation matching complete");
        matches
    }
}

fn all_still_available(pool: &Pool, candidate: &MatchCandidate) -> bool {
    std::iter::once(&candidate.trader_primary)
        .chain(candidate.trader_additional.iter())
        .all(|id| pool.available_trader(id).is_some())
        && std::iter::once(&candidate.exchange_primary)
            .chain(candidate.exchange_additional.iter())
            .all(|id| pool.available_exchange(id).is_some())
}

fn build_candidate(trader_bucket: &[Trade], exchange_bucket: &[Trade], confidence: u8) -> MatchCandidate {
    let (trader_primary, trader_additional) = trader_bucket.split_first().expect("non-empty bucket");
    let (exchange_primary, exchange_additional) = exchange_bucket.split_first().expect("non-empty bucket");
    MatchCandidate {
        rule_number: 7,
        match_type: MatchType::Aggregation,
        confidence,
        trader_primary: trader_primary.id.clone(),
        exchange_primary: exchange_primary.id.clone(),
        trader_additional: trader_additional.iter().map(|t| t.id.clone()).collect(),
        exchange_additional: exchange_additional.iter().map(|t| t.id.clone()).collect(),
        matched_fields: vec![
            "product".into(),
            "contract_month".into(),
            "price".into(),
            "buy_sell".into(),
        ],
        tolerances_applied: IndexMap::new(),
    }
}
